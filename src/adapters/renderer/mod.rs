// 方言レンダラー
//
// スキーマASTから各データベース方言用のDDL文を生成するアダプター層。
// レンダラーはASTの純粋関数であり、I/Oを行いません。

pub mod mysql;
pub mod postgres;

use crate::adapters::sql_quote::quote_literal;
use crate::core::ast::{
    ColumnNode, ConstraintNode, ConstraintType, CreateTableNode, DefaultValue, IndexNode, Node,
};
use crate::core::config::Dialect;
use crate::core::error::RenderError;

pub use mysql::MySqlRenderer;
pub use postgres::PostgresRenderer;

/// レンダラートレイト
///
/// 各データベース方言用のレンダラーが実装すべきインターフェース。
pub trait Renderer: Send + Sync {
    /// 対象の方言
    fn dialect(&self) -> Dialect;

    /// 単一ノードを個々の文（または断片）のリストとして描画
    ///
    /// 文は末尾のセミコロンまで含む完結した形で返されます。
    /// 描画できないノードはエラーになり、部分的な出力は返しません。
    fn render_statements(&self, node: &Node) -> Result<Vec<String>, RenderError>;

    /// 単一ノードを描画
    fn render(&self, node: &Node) -> Result<String, RenderError> {
        Ok(self.render_statements(node)?.join("\n"))
    }

    /// ノード列を順番に描画
    fn render_schema(&self, nodes: &[Node]) -> Result<String, RenderError> {
        let mut rendered = Vec::with_capacity(nodes.len());
        for node in nodes {
            rendered.push(self.render(node)?);
        }
        Ok(rendered.join("\n\n"))
    }
}

/// 方言に応じたレンダラーを作成
pub fn create_renderer(dialect: Dialect) -> Box<dyn Renderer> {
    match dialect {
        Dialect::PostgreSQL => Box::new(PostgresRenderer::new()),
        Dialect::MySQL | Dialect::MariaDB => Box::new(MySqlRenderer::new(dialect)),
    }
}

/// 型名の基底部分（パラメータを除き大文字化）
pub(crate) fn base_type(column_type: &str) -> String {
    let base = match column_type.find('(') {
        Some(pos) => &column_type[..pos],
        None => column_type,
    };
    base.trim().to_ascii_uppercase()
}

/// デフォルト値句
///
/// 数値・真偽値・NULLのリテラルはクォートせずに出力します。
pub(crate) fn render_default(dialect: Dialect, default: &DefaultValue) -> String {
    match default {
        DefaultValue::Function(expression) => expression.clone(),
        DefaultValue::Literal(value) => {
            let numeric = value.parse::<f64>().is_ok()
                && value
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
            let bare = numeric
                || ["true", "false", "null"]
                    .iter()
                    .any(|kw| value.eq_ignore_ascii_case(kw));
            if bare {
                value.clone()
            } else {
                quote_literal(dialect, value)
            }
        }
    }
}

pub(crate) fn column_list(columns: &[String]) -> String {
    columns.join(", ")
}

/// カラム定義の共通組み立てヘルパー
///
/// `attributes` は型の直後に挿入される方言固有の属性（AUTO_INCREMENT等）です。
pub(crate) fn build_column_definition(
    dialect: Dialect,
    column: &ColumnNode,
    type_str: String,
    attributes: &[&str],
    inline_primary: bool,
    in_primary_key: bool,
) -> String {
    let mut parts = vec![column.name.clone(), type_str];

    for attribute in attributes {
        if !attribute.is_empty() {
            parts.push((*attribute).to_string());
        }
    }

    if inline_primary {
        parts.push("PRIMARY KEY".to_string());
    } else if !column.nullable || in_primary_key || column.primary {
        parts.push("NOT NULL".to_string());
    }

    if column.unique && !inline_primary {
        parts.push("UNIQUE".to_string());
    }

    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {}", render_default(dialect, default)));
    }

    if let Some(check) = &column.check {
        parts.push(format!("CHECK ({})", check));
    }

    parts.join(" ")
}

/// テーブルレベル制約句
pub(crate) fn render_constraint(
    dialect: Dialect,
    constraint: &ConstraintNode,
) -> Result<String, RenderError> {
    let prefix = constraint
        .name
        .as_ref()
        .filter(|n| !n.is_empty())
        .map(|n| format!("CONSTRAINT {} ", n))
        .unwrap_or_default();

    let body = match constraint.kind {
        ConstraintType::PrimaryKey => {
            format!("PRIMARY KEY ({})", column_list(&constraint.columns))
        }
        ConstraintType::Unique => format!("UNIQUE ({})", column_list(&constraint.columns)),
        ConstraintType::Check => {
            let expression = constraint.expression.as_deref().ok_or_else(|| {
                RenderError::new(
                    format!("CONSTRAINT {}", constraint.name.as_deref().unwrap_or("")),
                    dialect,
                    "CHECK constraint without expression",
                )
            })?;
            format!("CHECK ({})", expression)
        }
        ConstraintType::ForeignKey => {
            let reference = constraint.reference.as_ref().ok_or_else(|| {
                RenderError::new(
                    format!("CONSTRAINT {}", constraint.name.as_deref().unwrap_or("")),
                    dialect,
                    "FOREIGN KEY constraint without referenced table",
                )
            })?;
            let mut clause = format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                column_list(&constraint.columns),
                reference.table,
                column_list(&reference.columns)
            );
            if let Some(action) = &reference.on_delete {
                clause.push_str(&format!(" ON DELETE {}", action));
            }
            if let Some(action) = &reference.on_update {
                clause.push_str(&format!(" ON UPDATE {}", action));
            }
            clause
        }
    };

    Ok(format!("{}{}", prefix, body))
}

/// テーブル内の制約句一覧
///
/// 複合プライマリキー、明示的な制約、カラムの外部キー参照の順に並びます。
pub(crate) fn table_constraints(
    dialect: Dialect,
    table: &CreateTableNode,
) -> Result<Vec<String>, RenderError> {
    let mut clauses = Vec::new();

    let has_pk_constraint = table
        .constraints
        .iter()
        .any(|c| c.kind == ConstraintType::PrimaryKey);
    let flagged: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.primary)
        .map(|c| c.name.clone())
        .collect();
    if !has_pk_constraint && flagged.len() > 1 {
        clauses.push(render_constraint(
            dialect,
            &ConstraintNode::primary_key(flagged),
        )?);
    }

    for constraint in &table.constraints {
        clauses.push(render_constraint(dialect, constraint)?);
    }

    for column in &table.columns {
        if let Some(fk) = &column.foreign_key {
            let constraint = ConstraintNode::from_foreign_key(&table.name, &column.name, fk);
            clauses.push(render_constraint(dialect, &constraint)?);
        }
    }

    Ok(clauses)
}

/// 単一カラムのプライマリキーをカラム定義にインライン化するかどうか
pub(crate) fn inline_primary_column(table: &CreateTableNode) -> Option<&str> {
    if table
        .constraints
        .iter()
        .any(|c| c.kind == ConstraintType::PrimaryKey)
    {
        return None;
    }
    let mut flagged = table.columns.iter().filter(|c| c.primary);
    match (flagged.next(), flagged.next()) {
        (Some(only), None) => Some(only.name.as_str()),
        _ => None,
    }
}

/// SQLコメント行（複数行は各行に接頭辞を付ける）
pub(crate) fn render_comment(text: &str) -> String {
    text.lines()
        .map(|line| format!("-- {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// CREATE INDEX
pub(crate) fn render_index(index: &IndexNode) -> String {
    format!(
        "CREATE {}INDEX {} ON {} ({});",
        if index.unique { "UNIQUE " } else { "" },
        index.name,
        index.table,
        column_list(&index.columns)
    )
}

/// ADD COLUMNに外部キー参照がある場合の追加制約文
pub(crate) fn render_add_foreign_key(
    dialect: Dialect,
    table: &str,
    column: &ColumnNode,
) -> Result<Option<String>, RenderError> {
    match &column.foreign_key {
        Some(fk) => {
            let constraint = ConstraintNode::from_foreign_key(table, &column.name, fk);
            Ok(Some(format!(
                "ALTER TABLE {} ADD {};",
                table,
                render_constraint(dialect, &constraint)?
            )))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ast::ReferenceSpec;

    #[test]
    fn test_base_type() {
        assert_eq!(base_type("varchar(255)"), "VARCHAR");
        assert_eq!(base_type(" double precision "), "DOUBLE PRECISION");
    }

    #[test]
    fn test_render_default_quotes_only_text() {
        let d = Dialect::PostgreSQL;
        assert_eq!(render_default(d, &DefaultValue::Literal("pending".into())), "'pending'");
        assert_eq!(render_default(d, &DefaultValue::Literal("0".into())), "0");
        assert_eq!(render_default(d, &DefaultValue::Literal("TRUE".into())), "TRUE");
        assert_eq!(render_default(d, &DefaultValue::Function("now()".into())), "now()");
    }

    #[test]
    fn test_render_foreign_key_constraint() {
        let constraint = ConstraintNode {
            kind: ConstraintType::ForeignKey,
            name: Some("fk_posts_user_id".to_string()),
            columns: vec!["user_id".to_string()],
            expression: None,
            reference: Some(ReferenceSpec {
                table: "users".to_string(),
                columns: vec!["id".to_string()],
                on_delete: Some("CASCADE".to_string()),
                on_update: None,
            }),
        };
        assert_eq!(
            render_constraint(Dialect::PostgreSQL, &constraint).unwrap(),
            "CONSTRAINT fk_posts_user_id FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_foreign_key_without_reference_is_render_error() {
        let constraint = ConstraintNode {
            kind: ConstraintType::ForeignKey,
            name: Some("fk_broken".to_string()),
            columns: vec!["a".to_string()],
            expression: None,
            reference: None,
        };
        let error = render_constraint(Dialect::MySQL, &constraint).unwrap_err();
        assert_eq!(error.dialect, Dialect::MySQL);
        assert!(error.statement.contains("fk_broken"));
    }

    #[test]
    fn test_render_index() {
        let index = IndexNode {
            name: "idx_user_email".to_string(),
            table: "users".to_string(),
            columns: vec!["email".to_string()],
            unique: true,
        };
        assert_eq!(
            render_index(&index),
            "CREATE UNIQUE INDEX idx_user_email ON users (email);"
        );
    }

    #[test]
    fn test_create_renderer_dialects() {
        assert_eq!(create_renderer(Dialect::PostgreSQL).dialect(), Dialect::PostgreSQL);
        assert_eq!(create_renderer(Dialect::MariaDB).dialect(), Dialect::MariaDB);
    }
}
