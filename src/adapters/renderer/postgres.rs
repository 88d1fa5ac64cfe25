// PostgreSQL用レンダラー
//
// スキーマASTからPostgreSQL用のDDL文を生成します。
// 自動採番カラムはSERIAL系の型に、ENUMは独立したCREATE TYPE文になります。

use crate::adapters::renderer::{
    base_type, build_column_definition, inline_primary_column, render_add_foreign_key,
    render_comment, render_constraint, render_default, render_index, table_constraints, Renderer,
};
use crate::adapters::sql_quote::quote_literal;
use crate::core::ast::{AlterOperation, AlterTableNode, ColumnNode, CreateTableNode, Node};
use crate::core::config::Dialect;
use crate::core::error::RenderError;

const DIALECT: Dialect = Dialect::PostgreSQL;

/// PostgreSQL用レンダラー
#[derive(Debug, Clone, Default)]
pub struct PostgresRenderer;

impl PostgresRenderer {
    pub fn new() -> Self {
        Self
    }

    /// カラムの型を解決
    ///
    /// 方言オーバーライドが最優先、次に自動採番のSERIAL化、最後に同義型の変換。
    fn column_type(&self, column: &ColumnNode) -> Result<String, RenderError> {
        if let Some(override_type) = column.type_override(DIALECT) {
            return Ok(override_type.to_string());
        }

        if column.auto_increment {
            let serial = match base_type(&column.column_type).as_str() {
                "SERIAL" | "INTEGER" | "INT" | "INT4" => "SERIAL",
                "BIGSERIAL" | "BIGINT" | "INT8" => "BIGSERIAL",
                "SMALLSERIAL" | "SMALLINT" | "INT2" => "SMALLSERIAL",
                _ => {
                    return Err(RenderError::new(
                        format!("COLUMN {}", column.name),
                        DIALECT,
                        format!(
                            "auto-increment requires an integer column type, got {}",
                            column.column_type
                        ),
                    ))
                }
            };
            return Ok(serial.to_string());
        }

        Ok(translate_type(&column.column_type))
    }

    /// ALTER COLUMN TYPEで使用する型（SERIAL系は実体の整数型）
    fn alter_type(&self, column: &ColumnNode) -> Result<String, RenderError> {
        let resolved = self.column_type(column)?;
        let mapped = match base_type(&resolved).as_str() {
            "SERIAL" => "INTEGER".to_string(),
            "BIGSERIAL" => "BIGINT".to_string(),
            "SMALLSERIAL" => "SMALLINT".to_string(),
            _ => resolved,
        };
        Ok(mapped)
    }

    fn column_definition(
        &self,
        column: &ColumnNode,
        inline_primary: bool,
        in_primary_key: bool,
    ) -> Result<String, RenderError> {
        let type_str = self.column_type(column)?;
        Ok(build_column_definition(
            DIALECT,
            column,
            type_str,
            &[],
            inline_primary,
            in_primary_key,
        ))
    }

    fn render_create_table(&self, table: &CreateTableNode) -> Result<Vec<String>, RenderError> {
        let inline = inline_primary_column(table);
        let primary_key = table.primary_key_columns();

        let mut lines = Vec::new();
        for column in &table.columns {
            let definition = self.column_definition(
                column,
                inline == Some(column.name.as_str()),
                primary_key.contains(&column.name),
            )?;
            lines.push(format!("  {}", definition));
        }
        for clause in table_constraints(DIALECT, table)? {
            lines.push(format!("  {}", clause));
        }

        let mut sql = if lines.is_empty() {
            format!("CREATE TABLE {} ()", table.name)
        } else {
            format!("CREATE TABLE {} (\n{}\n)", table.name, lines.join(",\n"))
        };

        // テーブルオプションはストレージパラメータとして出力
        if !table.options.is_empty() {
            let params: Vec<String> = table
                .options
                .iter()
                .map(|(key, value)| format!("{} = {}", key.to_ascii_lowercase(), value))
                .collect();
            sql.push_str(&format!(" WITH ({})", params.join(", ")));
        }
        sql.push(';');

        let mut statements = vec![sql];
        if let Some(comment) = &table.comment {
            statements.push(format!(
                "COMMENT ON TABLE {} IS {};",
                table.name,
                quote_literal(DIALECT, comment)
            ));
        }
        for column in &table.columns {
            if let Some(comment) = column_comment(&table.name, column) {
                statements.push(comment);
            }
        }

        Ok(statements)
    }

    fn render_alter_table(&self, alter: &AlterTableNode) -> Result<Vec<String>, RenderError> {
        let table = &alter.table;
        let mut statements = Vec::new();

        for operation in &alter.operations {
            match operation {
                AlterOperation::AddColumn(column) => {
                    let definition =
                        self.column_definition(column, column.primary, column.primary)?;
                    statements.push(format!("ALTER TABLE {} ADD COLUMN {};", table, definition));
                    if let Some(fk) = render_add_foreign_key(DIALECT, table, column)? {
                        statements.push(fk);
                    }
                    if let Some(comment) = column_comment(table, column) {
                        statements.push(comment);
                    }
                }
                AlterOperation::ModifyColumn(column) => {
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {} TYPE {};",
                        table,
                        column.name,
                        self.alter_type(column)?
                    ));
                    let nullability = if column.is_effectively_nullable() {
                        "DROP NOT NULL"
                    } else {
                        "SET NOT NULL"
                    };
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {} {};",
                        table, column.name, nullability
                    ));
                    // デフォルト値を持たない変更では既存のデフォルトに触れない
                    if let Some(default) = &column.default {
                        statements.push(format!(
                            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                            table,
                            column.name,
                            render_default(DIALECT, default)
                        ));
                    }
                }
                AlterOperation::DropColumn(name) => {
                    statements.push(format!("ALTER TABLE {} DROP COLUMN {};", table, name));
                }
            }
        }

        Ok(statements)
    }
}

impl Renderer for PostgresRenderer {
    fn dialect(&self) -> Dialect {
        DIALECT
    }

    fn render_statements(&self, node: &Node) -> Result<Vec<String>, RenderError> {
        match node {
            Node::CreateTable(table) => self.render_create_table(table),
            Node::AlterTable(alter) => self.render_alter_table(alter),
            Node::Column(column) => Ok(vec![self.column_definition(
                column,
                column.primary,
                column.primary,
            )?]),
            Node::Constraint(constraint) => Ok(vec![render_constraint(DIALECT, constraint)?]),
            Node::Index(index) => Ok(vec![render_index(index)]),
            Node::Enum(enum_node) => {
                let values: Vec<String> = enum_node
                    .values
                    .iter()
                    .map(|v| quote_literal(DIALECT, v))
                    .collect();
                Ok(vec![format!(
                    "CREATE TYPE {} AS ENUM ({});",
                    enum_node.name,
                    values.join(", ")
                )])
            }
            Node::Comment(comment) => Ok(vec![render_comment(&comment.text)]),
            Node::DropIndex(drop) => Ok(vec![format!("DROP INDEX IF EXISTS {};", drop.name)]),
        }
    }
}

/// 同義型の変換（MySQL由来の型名をPostgreSQLの型名へ）
fn translate_type(column_type: &str) -> String {
    let trimmed = column_type.trim();
    if trimmed.eq_ignore_ascii_case("tinyint(1)") {
        return "BOOLEAN".to_string();
    }

    let params = trimmed.find('(').map(|pos| &trimmed[pos..]).unwrap_or("");
    match base_type(trimmed).as_str() {
        "DATETIME" => format!("TIMESTAMP{}", params),
        "DOUBLE" => "DOUBLE PRECISION".to_string(),
        "LONGTEXT" | "MEDIUMTEXT" | "TINYTEXT" => "TEXT".to_string(),
        "BLOB" | "LONGBLOB" | "MEDIUMBLOB" | "TINYBLOB" => "BYTEA".to_string(),
        _ => trimmed.to_string(),
    }
}

fn column_comment(table: &str, column: &ColumnNode) -> Option<String> {
    column.comment.as_ref().map(|comment| {
        format!(
            "COMMENT ON COLUMN {}.{} IS {};",
            table,
            column.name,
            quote_literal(DIALECT, comment)
        )
    })
}
