// MySQL / MariaDB用レンダラー
//
// スキーマASTからMySQL系のDDL文を生成します。
// 自動採番はAUTO_INCREMENT属性に、ENUMはカラム型のインラインENUM(...)になります。

use crate::adapters::renderer::{
    base_type, build_column_definition, inline_primary_column, render_add_foreign_key,
    render_comment, render_constraint, render_index, table_constraints, Renderer,
};
use crate::adapters::sql_quote::quote_literal;
use crate::core::ast::{AlterOperation, AlterTableNode, ColumnNode, CreateTableNode, Node};
use crate::core::config::Dialect;
use crate::core::error::RenderError;
use std::collections::BTreeMap;

/// MySQL / MariaDB用レンダラー
#[derive(Debug, Clone)]
pub struct MySqlRenderer {
    dialect: Dialect,
    /// インライン展開するENUM定義（名前 → 値）
    enums: BTreeMap<String, Vec<String>>,
}

impl MySqlRenderer {
    /// MySQL系の方言でレンダラーを作成
    ///
    /// MySQL系以外の方言が渡された場合はMySQLとして扱います。
    pub fn new(dialect: Dialect) -> Self {
        let dialect = if dialect.is_mysql_family() {
            dialect
        } else {
            Dialect::MySQL
        };
        Self {
            dialect,
            enums: BTreeMap::new(),
        }
    }

    /// ENUM定義を登録
    pub fn with_enums<I, N>(mut self, enums: I) -> Self
    where
        I: IntoIterator<Item = (N, Vec<String>)>,
        N: Into<String>,
    {
        for (name, values) in enums {
            self.enums.insert(name.into(), values);
        }
        self
    }

    fn is_mariadb(&self) -> bool {
        self.dialect == Dialect::MariaDB
    }

    /// カラムの型と自動採番の有無を解決
    fn column_type(&self, column: &ColumnNode) -> (String, bool) {
        if let Some(override_type) = column.type_override(self.dialect) {
            return (override_type.to_string(), column.auto_increment);
        }

        if let Some(values) = self.enums.get(column.column_type.trim()) {
            let quoted: Vec<String> = values
                .iter()
                .map(|v| quote_literal(self.dialect, v))
                .collect();
            return (format!("ENUM({})", quoted.join(", ")), false);
        }

        let trimmed = column.column_type.trim();
        let params = trimmed.find('(').map(|pos| &trimmed[pos..]).unwrap_or("");
        let translated = match base_type(trimmed).as_str() {
            "SERIAL" => return ("INT".to_string(), true),
            "BIGSERIAL" => return ("BIGINT".to_string(), true),
            "SMALLSERIAL" => return ("SMALLINT".to_string(), true),
            "JSONB" => "JSON".to_string(),
            "BYTEA" => "BLOB".to_string(),
            "UUID" if !self.is_mariadb() => "CHAR(36)".to_string(),
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" | "TIMESTAMP WITHOUT TIME ZONE" => {
                format!("TIMESTAMP{}", params)
            }
            "DOUBLE PRECISION" => "DOUBLE".to_string(),
            "CHARACTER VARYING" => format!("VARCHAR{}", params),
            _ => trimmed.to_string(),
        };
        (translated, column.auto_increment)
    }

    fn column_definition(
        &self,
        column: &ColumnNode,
        inline_primary: bool,
        in_primary_key: bool,
    ) -> String {
        let (type_str, auto_increment) = self.column_type(column);
        let attributes: &[&str] = if auto_increment {
            &["AUTO_INCREMENT"]
        } else {
            &[]
        };
        let mut definition = build_column_definition(
            self.dialect,
            column,
            type_str,
            attributes,
            inline_primary,
            in_primary_key,
        );
        if let Some(comment) = &column.comment {
            definition.push_str(&format!(" COMMENT {}", quote_literal(self.dialect, comment)));
        }
        definition
    }

    /// テーブルオプション句（ENGINEを先頭に、コメントを末尾に）
    fn table_options(&self, table: &CreateTableNode) -> Vec<String> {
        let mut options = Vec::new();
        let mut rest = Vec::new();

        for (key, value) in &table.options {
            let key = key.to_ascii_uppercase();
            match key.as_str() {
                "ENGINE" => options.push(format!("ENGINE={}", value)),
                "CHARSET" | "CHARACTER SET" | "DEFAULT CHARSET" => {
                    rest.push(format!("DEFAULT CHARSET={}", value))
                }
                _ => rest.push(format!("{}={}", key, value)),
            }
        }
        options.extend(rest);

        if let Some(comment) = &table.comment {
            options.push(format!("COMMENT={}", quote_literal(self.dialect, comment)));
        }
        options
    }

    fn render_create_table(&self, table: &CreateTableNode) -> Result<String, RenderError> {
        let inline = inline_primary_column(table);
        let primary_key = table.primary_key_columns();

        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                format!(
                    "  {}",
                    self.column_definition(
                        column,
                        inline == Some(column.name.as_str()),
                        primary_key.contains(&column.name),
                    )
                )
            })
            .collect();
        for clause in table_constraints(self.dialect, table)? {
            lines.push(format!("  {}", clause));
        }

        if lines.is_empty() {
            return Err(RenderError::new(
                format!("CREATE TABLE {}", table.name),
                self.dialect,
                "a table must have at least one column",
            ));
        }

        let mut sql = format!("CREATE TABLE {} (\n{}\n)", table.name, lines.join(",\n"));
        let options = self.table_options(table);
        if !options.is_empty() {
            sql.push(' ');
            sql.push_str(&options.join(" "));
        }
        sql.push(';');
        Ok(sql)
    }

    fn render_alter_table(&self, alter: &AlterTableNode) -> Result<Vec<String>, RenderError> {
        let table = &alter.table;
        let mut statements = Vec::new();

        for operation in &alter.operations {
            match operation {
                AlterOperation::AddColumn(column) => {
                    let definition = self.column_definition(column, column.primary, column.primary);
                    statements.push(format!("ALTER TABLE {} ADD COLUMN {};", table, definition));
                    if let Some(fk) = render_add_foreign_key(self.dialect, table, column)? {
                        statements.push(fk);
                    }
                }
                AlterOperation::ModifyColumn(column) => {
                    // 既存のプライマリキーとユニークインデックスは再定義しない
                    // （MODIFY ... UNIQUE は実行のたびにインデックスを増やす）
                    let column = ColumnNode {
                        unique: false,
                        ..column.clone()
                    };
                    let definition = self.column_definition(&column, false, column.primary);
                    statements.push(format!(
                        "ALTER TABLE {} MODIFY COLUMN {};",
                        table, definition
                    ));
                }
                AlterOperation::DropColumn(name) => {
                    statements.push(format!("ALTER TABLE {} DROP COLUMN {};", table, name));
                }
            }
        }

        Ok(statements)
    }
}

impl Renderer for MySqlRenderer {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn render_statements(&self, node: &Node) -> Result<Vec<String>, RenderError> {
        match node {
            Node::CreateTable(table) => Ok(vec![self.render_create_table(table)?]),
            Node::AlterTable(alter) => self.render_alter_table(alter),
            Node::Column(column) => Ok(vec![self.column_definition(
                column,
                column.primary,
                column.primary,
            )]),
            Node::Constraint(constraint) => {
                Ok(vec![render_constraint(self.dialect, constraint)?])
            }
            Node::Index(index) => Ok(vec![render_index(index)]),
            Node::Enum(enum_node) => Err(RenderError::new(
                format!("CREATE TYPE {}", enum_node.name),
                self.dialect,
                "standalone enum types are not supported; enums are inlined into column definitions",
            )),
            Node::Comment(comment) => Ok(vec![render_comment(&comment.text)]),
            Node::DropIndex(drop) => {
                let table = drop.table.as_deref().ok_or_else(|| {
                    RenderError::new(
                        format!("DROP INDEX {}", drop.name),
                        self.dialect,
                        "the owning table is required to drop an index",
                    )
                })?;
                let if_exists = if self.is_mariadb() { "IF EXISTS " } else { "" };
                Ok(vec![format!(
                    "DROP INDEX {}{} ON {};",
                    if_exists, drop.name, table
                )])
            }
        }
    }

    /// ノード列を描画
    ///
    /// ENUMノードは後続カラムのインライン定義として登録され、単独では出力されません。
    fn render_schema(&self, nodes: &[Node]) -> Result<String, RenderError> {
        let mut renderer = self.clone();
        for node in nodes {
            if let Node::Enum(enum_node) = node {
                renderer
                    .enums
                    .insert(enum_node.name.clone(), enum_node.values.clone());
            }
        }

        let mut rendered = Vec::new();
        for node in nodes.iter().filter(|n| !matches!(n, Node::Enum(_))) {
            rendered.push(renderer.render(node)?);
        }
        Ok(rendered.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ast::{DropIndexNode, EnumNode};
    use crate::core::builder::SchemaBuilder;

    #[test]
    fn test_create_table_with_auto_increment_and_inline_enum() {
        let nodes = SchemaBuilder::new()
            .enumeration("status_enum", &["active", "inactive"])
            .table("users")
            .option("engine", "InnoDB")
            .option("charset", "utf8mb4")
            .column("id", "SERIAL")
            .primary()
            .end()
            .column("status", "status_enum")
            .not_null()
            .default_value("active")
            .end()
            .end()
            .build();

        let sql = MySqlRenderer::new(Dialect::MySQL).render_schema(&nodes).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE users (\n\
             \x20 id INT AUTO_INCREMENT PRIMARY KEY,\n\
             \x20 status ENUM('active', 'inactive') NOT NULL DEFAULT 'active'\n\
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"
        );
    }

    #[test]
    fn test_standalone_enum_is_render_error() {
        let node = Node::Enum(EnumNode {
            name: "status_enum".to_string(),
            values: vec!["a".to_string()],
        });
        let error = MySqlRenderer::new(Dialect::MariaDB).render(&node).unwrap_err();
        assert_eq!(error.dialect, Dialect::MariaDB);
        assert_eq!(error.statement, "CREATE TYPE status_enum");
    }

    #[test]
    fn test_with_enums_registers_inline_type() {
        let renderer = MySqlRenderer::new(Dialect::MySQL)
            .with_enums(vec![("priority", vec!["low".to_string(), "high".to_string()])]);
        let column = SchemaBuilder::new()
            .table("tasks")
            .column("priority", "priority")
            .into_column();
        assert_eq!(
            renderer.render(&Node::Column(column)).unwrap(),
            "priority ENUM('low', 'high')"
        );
    }

    #[test]
    fn test_postgres_types_are_translated() {
        let renderer = MySqlRenderer::new(Dialect::MySQL);
        let mariadb = MySqlRenderer::new(Dialect::MariaDB);
        let column = |t: &str| ColumnNode::new("c", t);

        assert_eq!(renderer.column_type(&column("JSONB")).0, "JSON");
        assert_eq!(renderer.column_type(&column("BYTEA")).0, "BLOB");
        assert_eq!(renderer.column_type(&column("UUID")).0, "CHAR(36)");
        assert_eq!(mariadb.column_type(&column("UUID")).0, "UUID");
        assert_eq!(renderer.column_type(&column("TIMESTAMPTZ")).0, "TIMESTAMP");
        assert_eq!(renderer.column_type(&column("DOUBLE PRECISION")).0, "DOUBLE");
        assert_eq!(renderer.column_type(&column("BIGSERIAL")), ("BIGINT".to_string(), true));
    }

    #[test]
    fn test_type_override_wins() {
        let column = SchemaBuilder::new()
            .table("t")
            .column("payload", "JSONB")
            .type_override("mysql", "LONGTEXT")
            .type_override("mariadb", "JSON")
            .into_column();
        let mysql = MySqlRenderer::new(Dialect::MySQL);
        let mariadb = MySqlRenderer::new(Dialect::MariaDB);
        assert_eq!(mysql.render(&Node::Column(column.clone())).unwrap(), "payload LONGTEXT");
        assert_eq!(mariadb.render(&Node::Column(column)).unwrap(), "payload JSON");
    }

    #[test]
    fn test_inline_comments() {
        let nodes = SchemaBuilder::new()
            .table("users")
            .comment("accounts")
            .column("email", "VARCHAR(255)")
            .not_null()
            .comment("login")
            .end()
            .end()
            .build();
        let sql = MySqlRenderer::new(Dialect::MySQL).render_schema(&nodes).unwrap();
        assert!(sql.contains("email VARCHAR(255) NOT NULL COMMENT 'login'"));
        assert!(sql.ends_with(") COMMENT='accounts';"));
    }

    #[test]
    fn test_modify_column() {
        let mut column = ColumnNode::new("name", "VARCHAR(100)");
        column.nullable = false;
        let node = Node::AlterTable(AlterTableNode::new(
            "users",
            vec![AlterOperation::ModifyColumn(column)],
        ));
        assert_eq!(
            MySqlRenderer::new(Dialect::MySQL).render(&node).unwrap(),
            "ALTER TABLE users MODIFY COLUMN name VARCHAR(100) NOT NULL;"
        );
    }

    #[test]
    fn test_modify_column_does_not_repeat_unique() {
        let mut email = ColumnNode::new("email", "VARCHAR(255)");
        email.nullable = false;
        email.unique = true;
        let node = Node::AlterTable(AlterTableNode::new(
            "users",
            vec![AlterOperation::ModifyColumn(email)],
        ));
        for dialect in [Dialect::MySQL, Dialect::MariaDB] {
            let statements = MySqlRenderer::new(dialect).render_statements(&node).unwrap();
            assert_eq!(
                statements,
                vec!["ALTER TABLE users MODIFY COLUMN email VARCHAR(255) NOT NULL;"]
            );
        }
    }

    #[test]
    fn test_drop_index_per_flavour() {
        let node = Node::DropIndex(DropIndexNode {
            name: "idx_old".to_string(),
            table: Some("users".to_string()),
        });
        assert_eq!(
            MySqlRenderer::new(Dialect::MySQL).render(&node).unwrap(),
            "DROP INDEX idx_old ON users;"
        );
        assert_eq!(
            MySqlRenderer::new(Dialect::MariaDB).render(&node).unwrap(),
            "DROP INDEX IF EXISTS idx_old ON users;"
        );

        let orphan = Node::DropIndex(DropIndexNode {
            name: "idx_old".to_string(),
            table: None,
        });
        assert!(MySqlRenderer::new(Dialect::MySQL).render(&orphan).is_err());
    }

    #[test]
    fn test_new_coerces_non_mysql_dialect() {
        assert_eq!(MySqlRenderer::new(Dialect::PostgreSQL).dialect(), Dialect::MySQL);
    }
}
