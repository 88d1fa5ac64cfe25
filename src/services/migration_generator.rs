// マイグレーションSQL生成サービス
//
// スキーマ差分を方言に応じた順序付きDDL文のリストに変換します。
// 追加系の操作のみを実行可能な文として出力し、破壊的な操作は
// 手動対応を促すSQLコメントとして出力します。

use crate::core::ast::{AlterOperation, AlterTableNode, DropIndexNode, EnumNode, IndexNode, Node};
use crate::core::config::Dialect;
use crate::core::error::RenderError;
use crate::core::package::PackageParseResult;
use crate::core::schema_diff::SchemaDiff;
use crate::services::dependency_order::creation_order;
use crate::services::schema_conversion::{
    build_column, build_table_nodes, renderer_for, table_dependencies,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// 差分からマイグレーションSQLを生成
///
/// 出力順序は固定です: ENUM追加 → ENUM変更 → テーブル追加 → テーブル変更 →
/// インデックス追加 → インデックス削除 → テーブル削除 → ENUM削除。
/// 各要素は単独で実行可能な文、または自動実行しない操作の説明コメントです。
pub fn generate_migration_sql(
    diff: &SchemaDiff,
    desired: &PackageParseResult,
    dialect: Dialect,
) -> Result<Vec<String>, RenderError> {
    let renderer = renderer_for(desired, dialect);
    let mut statements: Vec<String> = Vec::new();
    let native_enums = dialect.has_native_enums();

    // 1. ENUM追加（PostgreSQLのみ）
    if native_enums {
        for name in &diff.enums_added {
            match desired.enum_by_name(name) {
                Some(enum_def) => statements.extend(renderer.render_statements(&Node::Enum(
                    EnumNode {
                        name: enum_def.name.clone(),
                        values: enum_def.values.clone(),
                    },
                ))?),
                None => warn!(enum_name = %name, "Added enum is missing from the desired schema"),
            }
        }
    }

    // 2. ENUM変更（値の追加のみ実行）
    if native_enums {
        for enum_diff in &diff.enums_modified {
            for value in &enum_diff.values_added {
                statements.push(format!(
                    "ALTER TYPE {} ADD VALUE '{}';",
                    enum_diff.enum_name,
                    value.replace('\'', "''")
                ));
            }
            if !enum_diff.values_removed.is_empty() {
                statements.push(advisory(format!(
                    "-- WARNING: Cannot remove enum values [{}] from {} without recreating the enum",
                    enum_diff.values_removed.join(", "),
                    enum_diff.enum_name
                )));
            }
        }
    }

    // 3. テーブル追加（外部キー依存順）
    let added_tables: BTreeSet<&str> = diff.tables_added.iter().map(String::as_str).collect();
    let dependencies: BTreeMap<String, BTreeSet<String>> = table_dependencies(desired)
        .into_iter()
        .filter(|(table, _)| added_tables.contains(table.as_str()))
        .collect();
    let mut ordered = creation_order(&dependencies);
    // 望ましいスキーマに宣言がない追加テーブルは警告のみ
    for name in &diff.tables_added {
        if !ordered.contains(name) {
            ordered.push(name.clone());
        }
    }
    for name in &ordered {
        let Some(table) = desired.table_by_name(name) else {
            warn!(table = %name, "Added table is missing from the desired schema");
            continue;
        };
        for node in build_table_nodes(desired, table, dialect) {
            statements.extend(renderer.render_statements(&node)?);
        }
    }

    // 4. テーブル変更
    for table_diff in &diff.tables_modified {
        let table_name = &table_diff.table_name;
        statements.push(format!("-- Modify table: {}", table_name));

        let directive = desired.table_by_name(table_name);
        for column_name in &table_diff.columns_added {
            let field = directive.and_then(|table| {
                desired
                    .fields_for_table(table)
                    .find(|f| &f.name == column_name)
            });
            let Some(field) = field else {
                warn!(
                    table = %table_name,
                    column = %column_name,
                    "Added column is missing from the desired schema"
                );
                continue;
            };
            let node = Node::AlterTable(AlterTableNode::new(
                table_name.clone(),
                vec![AlterOperation::AddColumn(build_column(table_name, field))],
            ));
            statements.extend(renderer.render_statements(&node)?);
        }

        for column_diff in &table_diff.columns_modified {
            for (kind, change) in &column_diff.changes {
                statements.push(advisory(format!(
                    "-- TODO: ALTER TABLE {} ALTER COLUMN {} ({}); ({})",
                    table_name, column_diff.column_name, kind, change
                )));
            }
        }

        for column_name in &table_diff.columns_removed {
            statements.push(advisory(format!(
                "-- WARNING: ALTER TABLE {} DROP COLUMN {}; -- This will delete data!",
                table_name, column_name
            )));
        }
    }

    // 5. インデックス追加（新規テーブルのインデックスは作成済み）
    for name in &diff.indexes_added {
        let Some((index, table)) = desired.index_by_name(name) else {
            warn!(index = %name, "Added index is missing from the desired schema");
            continue;
        };
        if added_tables.contains(table.name.as_str()) {
            continue;
        }
        let node = Node::Index(IndexNode {
            name: index.name.clone(),
            table: table.name.clone(),
            columns: index.fields.clone(),
            unique: index.unique,
        });
        statements.extend(renderer.render_statements(&node)?);
    }

    // 6. インデックス削除
    for name in &diff.indexes_removed {
        let node = Node::DropIndex(DropIndexNode {
            name: name.clone(),
            table: diff.index_tables.get(name).cloned(),
        });
        statements.extend(renderer.render_statements(&node)?);
    }

    // 7. テーブル削除（コメントのみ）
    for name in &diff.tables_removed {
        statements.push(advisory(format!(
            "-- WARNING: DROP TABLE {}; -- This will delete all data!",
            name
        )));
    }

    // 8. ENUM削除（コメントのみ）
    if native_enums {
        for name in &diff.enums_removed {
            statements.push(advisory(format!(
                "-- WARNING: DROP TYPE {}; -- Make sure no tables use this enum!",
                name
            )));
        }
    }

    info!(
        dialect = %dialect,
        statements = statements.len(),
        "Generated migration SQL"
    );
    debug!(summary = %diff.summary(), "Migration source diff");

    Ok(statements)
}

// 自動実行しない操作を記録して返す
fn advisory(comment: String) -> String {
    warn!(statement = %comment, "Destructive change requires manual action");
    comment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::{GlobalEnum, SchemaField, SchemaIndex, TableDirective};
    use crate::core::schema_diff::{ColumnDiff, EnumDiff, TableDiff};

    fn desired() -> PackageParseResult {
        PackageParseResult {
            tables: vec![
                TableDirective {
                    struct_name: "Post".to_string(),
                    name: "posts".to_string(),
                    ..Default::default()
                },
                TableDirective {
                    struct_name: "User".to_string(),
                    name: "users".to_string(),
                    ..Default::default()
                },
            ],
            fields: vec![
                SchemaField {
                    struct_name: "User".to_string(),
                    name: "id".to_string(),
                    field_type: "SERIAL".to_string(),
                    primary: true,
                    ..Default::default()
                },
                SchemaField {
                    struct_name: "User".to_string(),
                    name: "status".to_string(),
                    field_type: "status_enum".to_string(),
                    ..Default::default()
                },
                SchemaField {
                    struct_name: "Post".to_string(),
                    name: "author_id".to_string(),
                    field_type: "INTEGER".to_string(),
                    foreign: Some("users(id)".to_string()),
                    ..Default::default()
                },
                SchemaField {
                    struct_name: "Post".to_string(),
                    name: "title".to_string(),
                    field_type: "TEXT".to_string(),
                    nullable: true,
                    ..Default::default()
                },
            ],
            indexes: vec![SchemaIndex {
                struct_name: "Post".to_string(),
                name: "idx_posts_title".to_string(),
                fields: vec!["title".to_string()],
                ..Default::default()
            }],
            enums: vec![GlobalEnum {
                name: "status_enum".to_string(),
                values: vec!["active".to_string(), "inactive".to_string()],
            }],
        }
    }

    fn position(statements: &[String], needle: &str) -> usize {
        statements
            .iter()
            .position(|s| s.contains(needle))
            .unwrap_or_else(|| panic!("{} not found in {:?}", needle, statements))
    }

    #[test]
    fn test_added_tables_follow_foreign_key_order() {
        let diff = SchemaDiff {
            tables_added: vec!["posts".to_string(), "users".to_string()],
            ..Default::default()
        };
        let statements = generate_migration_sql(&diff, &desired(), Dialect::PostgreSQL).unwrap();
        assert!(
            position(&statements, "CREATE TABLE users")
                < position(&statements, "CREATE TABLE posts")
        );
        // 新規テーブルのインデックスはテーブルの直後に一度だけ
        assert_eq!(
            statements
                .iter()
                .filter(|s| s.contains("CREATE INDEX idx_posts_title"))
                .count(),
            1
        );
    }

    #[test]
    fn test_index_on_new_table_is_not_duplicated() {
        let diff = SchemaDiff {
            tables_added: vec!["posts".to_string()],
            indexes_added: vec!["idx_posts_title".to_string()],
            ..Default::default()
        };
        let statements = generate_migration_sql(&diff, &desired(), Dialect::PostgreSQL).unwrap();
        assert_eq!(
            statements
                .iter()
                .filter(|s| s.contains("idx_posts_title"))
                .count(),
            1
        );
    }

    #[test]
    fn test_enum_changes_on_postgres() {
        let diff = SchemaDiff {
            enums_modified: vec![EnumDiff {
                enum_name: "status_enum".to_string(),
                values_added: vec!["archived".to_string()],
                values_removed: vec!["deleted".to_string(), "hidden".to_string()],
            }],
            enums_removed: vec!["legacy_enum".to_string()],
            ..Default::default()
        };
        let statements = generate_migration_sql(&diff, &desired(), Dialect::PostgreSQL).unwrap();
        assert_eq!(
            statements,
            vec![
                "ALTER TYPE status_enum ADD VALUE 'archived';",
                "-- WARNING: Cannot remove enum values [deleted, hidden] from status_enum without recreating the enum",
                "-- WARNING: DROP TYPE legacy_enum; -- Make sure no tables use this enum!",
            ]
        );
    }

    #[test]
    fn test_enums_are_skipped_for_mysql() {
        let diff = SchemaDiff {
            enums_added: vec!["status_enum".to_string()],
            tables_added: vec!["users".to_string()],
            ..Default::default()
        };
        let statements = generate_migration_sql(&diff, &desired(), Dialect::MySQL).unwrap();
        assert!(statements.iter().all(|s| !s.contains("CREATE TYPE")));
        assert!(statements[0].contains("status ENUM('active', 'inactive') NOT NULL"));
    }

    #[test]
    fn test_modified_table_statements() {
        let mut changes = BTreeMap::new();
        changes.insert("nullable".to_string(), "false -> true".to_string());
        changes.insert("type".to_string(), "varchar -> text".to_string());

        let diff = SchemaDiff {
            tables_modified: vec![TableDiff {
                table_name: "posts".to_string(),
                columns_added: vec!["title".to_string()],
                columns_removed: vec!["legacy".to_string()],
                columns_modified: vec![ColumnDiff {
                    column_name: "body".to_string(),
                    changes,
                }],
            }],
            ..Default::default()
        };
        let statements = generate_migration_sql(&diff, &desired(), Dialect::PostgreSQL).unwrap();
        assert_eq!(
            statements,
            vec![
                "-- Modify table: posts",
                "ALTER TABLE posts ADD COLUMN title TEXT;",
                "-- TODO: ALTER TABLE posts ALTER COLUMN body (nullable); (false -> true)",
                "-- TODO: ALTER TABLE posts ALTER COLUMN body (type); (varchar -> text)",
                "-- WARNING: ALTER TABLE posts DROP COLUMN legacy; -- This will delete data!",
            ]
        );
    }

    #[test]
    fn test_removed_indexes_use_owning_table_on_mysql() {
        let mut diff = SchemaDiff {
            indexes_removed: vec!["idx_old".to_string()],
            ..Default::default()
        };
        diff.index_tables
            .insert("idx_old".to_string(), "posts".to_string());

        let pg = generate_migration_sql(&diff, &desired(), Dialect::PostgreSQL).unwrap();
        assert_eq!(pg, vec!["DROP INDEX IF EXISTS idx_old;"]);

        let mysql = generate_migration_sql(&diff, &desired(), Dialect::MySQL).unwrap();
        assert_eq!(mysql, vec!["DROP INDEX idx_old ON posts;"]);
    }

    #[test]
    fn test_empty_diff_produces_no_statements() {
        let statements =
            generate_migration_sql(&SchemaDiff::new(), &desired(), Dialect::MariaDB).unwrap();
        assert!(statements.is_empty());
    }
}
