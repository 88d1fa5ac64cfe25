// スキーマAST
//
// 方言に依存しないスキーマオブジェクト（テーブル・カラム・制約・インデックス・ENUM）の
// 抽象構文木を定義します。各方言のレンダラーはこのノードを網羅的にパターンマッチして
// DDLを生成します。

use crate::core::config::Dialect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ASTノード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    CreateTable(CreateTableNode),
    AlterTable(AlterTableNode),
    Column(ColumnNode),
    Constraint(ConstraintNode),
    Index(IndexNode),
    Enum(EnumNode),
    Comment(CommentNode),
    DropIndex(DropIndexNode),
}

impl Node {
    /// ノードの対象オブジェクトを表す短い説明（エラーメッセージ用）
    pub fn describe(&self) -> String {
        match self {
            Node::CreateTable(t) => format!("CREATE TABLE {}", t.name),
            Node::AlterTable(a) => format!("ALTER TABLE {}", a.table),
            Node::Column(c) => format!("COLUMN {}", c.name),
            Node::Constraint(c) => format!("CONSTRAINT {}", c.name.as_deref().unwrap_or("")),
            Node::Index(i) => format!("CREATE INDEX {}", i.name),
            Node::Enum(e) => format!("CREATE TYPE {}", e.name),
            Node::Comment(_) => "COMMENT".to_string(),
            Node::DropIndex(d) => format!("DROP INDEX {}", d.name),
        }
    }
}

/// カラムのデフォルト値
///
/// リテラル値と関数式は排他的です。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// リテラル値（レンダリング時にクォートされる）
    Literal(String),
    /// 関数式（`now()` など、そのまま出力される）
    Function(String),
}

/// カラム単位の外部キー参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// 参照先テーブル
    pub table: String,
    /// 参照先カラム
    pub column: String,
    /// 制約名（未指定時は `fk_{table}_{column}`）
    pub name: Option<String>,
    /// ON DELETE アクション
    pub on_delete: Option<String>,
    /// ON UPDATE アクション
    pub on_update: Option<String>,
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            name: None,
            on_delete: None,
            on_update: None,
        }
    }

    /// 制約名を解決
    pub fn constraint_name(&self, owner_table: &str, owner_column: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("fk_{}_{}", owner_table, owner_column))
    }
}

/// カラム定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnNode {
    pub name: String,
    /// 宣言された型（生の文字列）
    pub column_type: String,
    pub nullable: bool,
    pub primary: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default: Option<DefaultValue>,
    pub check: Option<String>,
    pub comment: Option<String>,
    pub foreign_key: Option<ForeignKeyRef>,
    /// 方言名をキーとする型オーバーライド
    pub type_overrides: BTreeMap<String, String>,
}

impl ColumnNode {
    /// 新しいカラム定義を作成（デフォルトはNULL許可）
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: true,
            primary: false,
            unique: false,
            auto_increment: false,
            default: None,
            check: None,
            comment: None,
            foreign_key: None,
            type_overrides: BTreeMap::new(),
        }
    }

    /// 実効的なNULL許可
    ///
    /// プライマリキーは宣言に関わらず常にNOT NULLです。
    pub fn is_effectively_nullable(&self) -> bool {
        self.nullable && !self.primary
    }

    /// 方言のオーバーライドがあればそれを返す
    pub fn type_override(&self, dialect: Dialect) -> Option<&str> {
        self.type_overrides.get(dialect.name()).map(String::as_str)
    }
}

/// 制約の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintType {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
}

impl std::fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConstraintType::PrimaryKey => "PRIMARY KEY",
            ConstraintType::ForeignKey => "FOREIGN KEY",
            ConstraintType::Unique => "UNIQUE",
            ConstraintType::Check => "CHECK",
        };
        write!(f, "{}", s)
    }
}

/// 外部キー制約の参照先
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub table: String,
    pub columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

/// テーブルレベル制約
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintNode {
    pub kind: ConstraintType,
    pub name: Option<String>,
    pub columns: Vec<String>,
    /// CHECK制約の式
    pub expression: Option<String>,
    /// FOREIGN KEY制約の参照先
    pub reference: Option<ReferenceSpec>,
}

impl ConstraintNode {
    /// 複合プライマリキー制約
    pub fn primary_key(columns: Vec<String>) -> Self {
        Self {
            kind: ConstraintType::PrimaryKey,
            name: None,
            columns,
            expression: None,
            reference: None,
        }
    }

    /// UNIQUE制約
    pub fn unique(name: Option<String>, columns: Vec<String>) -> Self {
        Self {
            kind: ConstraintType::Unique,
            name,
            columns,
            expression: None,
            reference: None,
        }
    }

    /// CHECK制約
    pub fn check(name: Option<String>, expression: impl Into<String>) -> Self {
        Self {
            kind: ConstraintType::Check,
            name,
            columns: Vec::new(),
            expression: Some(expression.into()),
            reference: None,
        }
    }

    /// カラムの外部キー参照から制約を作成
    pub fn from_foreign_key(table: &str, column: &str, fk: &ForeignKeyRef) -> Self {
        Self {
            kind: ConstraintType::ForeignKey,
            name: Some(fk.constraint_name(table, column)),
            columns: vec![column.to_string()],
            expression: None,
            reference: Some(ReferenceSpec {
                table: fk.table.clone(),
                columns: vec![fk.column.clone()],
                on_delete: fk.on_delete.clone(),
                on_update: fk.on_update.clone(),
            }),
        }
    }
}

/// CREATE TABLE
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateTableNode {
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<ColumnNode>,
    pub constraints: Vec<ConstraintNode>,
    /// 方言固有のテーブルオプション（ENGINE, CHARSET等）
    pub options: BTreeMap<String, String>,
}

impl CreateTableNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// プライマリキーを構成するカラム名
    ///
    /// 明示的なPRIMARY KEY制約があればそれを優先し、なければ
    /// `primary` フラグが立ったカラムを宣言順に返します。
    pub fn primary_key_columns(&self) -> Vec<String> {
        if let Some(pk) = self
            .constraints
            .iter()
            .find(|c| c.kind == ConstraintType::PrimaryKey)
        {
            return pk.columns.clone();
        }
        self.columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.clone())
            .collect()
    }

    /// テーブルが参照している他テーブル名（自己参照を除く）
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut refs: Vec<String> = self
            .columns
            .iter()
            .filter_map(|c| c.foreign_key.as_ref().map(|fk| fk.table.clone()))
            .chain(
                self.constraints
                    .iter()
                    .filter_map(|c| c.reference.as_ref().map(|r| r.table.clone())),
            )
            .filter(|t| t != &self.name)
            .collect();
        refs.sort();
        refs.dedup();
        refs
    }
}

/// ALTER TABLEの操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlterOperation {
    AddColumn(ColumnNode),
    ModifyColumn(ColumnNode),
    DropColumn(String),
}

/// ALTER TABLE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterTableNode {
    pub table: String,
    pub operations: Vec<AlterOperation>,
}

impl AlterTableNode {
    pub fn new(table: impl Into<String>, operations: Vec<AlterOperation>) -> Self {
        Self {
            table: table.into(),
            operations,
        }
    }
}

/// CREATE INDEX
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNode {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// DROP INDEX
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropIndexNode {
    pub name: String,
    /// 所属テーブル（MySQL系で必須）
    pub table: Option<String>,
}

/// ENUM型定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumNode {
    pub name: String,
    pub values: Vec<String>,
}

/// SQLコメント行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentNode {
    pub text: String,
}
