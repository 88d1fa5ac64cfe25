// 実スキーマモデル
//
// 稼働中のデータベースのカタログから読み取ったスキーマを表現します。
// イントロスペクターが生成し、比較器が望ましいスキーマと突き合わせます。

use crate::core::config::Dialect;
use serde::{Deserialize, Serialize};

/// データベーススキーマ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    /// 読み取り元の方言
    pub dialect: Dialect,
    pub tables: Vec<DbTable>,
    pub enums: Vec<DbEnum>,
    pub indexes: Vec<DbIndex>,
    pub constraints: Vec<DbConstraint>,
}

impl DatabaseSchema {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    /// テーブル名で検索
    pub fn table(&self, name: &str) -> Option<&DbTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// ENUM名で検索
    pub fn enum_type(&self, name: &str) -> Option<&DbEnum> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// インデックス名で検索
    pub fn index(&self, name: &str) -> Option<&DbIndex> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// テーブルに属する制約
    pub fn constraints_for_table<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a DbConstraint> + 'a {
        self.constraints.iter().filter(move |c| c.table_name == table)
    }

    /// テーブル名の一覧
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }
}

/// テーブル
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbTable {
    pub name: String,
    /// BASE TABLE / VIEW など
    pub table_type: String,
    pub comment: Option<String>,
    pub columns: Vec<DbColumn>,
}

impl DbTable {
    pub fn column(&self, name: &str) -> Option<&DbColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// カラム
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbColumn {
    pub name: String,
    /// information_schema.columns.data_type
    pub data_type: String,
    /// ユーザー定義型名（PostgreSQLのENUM等）
    pub udt_name: Option<String>,
    /// 完全な型表記（MySQLの `enum('a','b')` や `varchar(255)`）
    pub column_type: Option<String>,
    pub is_nullable: bool,
    pub column_default: Option<String>,
    pub character_maximum_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
    pub ordinal_position: i64,
    pub is_auto_increment: bool,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub comment: Option<String>,
}

impl DbColumn {
    /// 実効的なNULL許可（プライマリキーは常にNOT NULL）
    pub fn is_effectively_nullable(&self) -> bool {
        self.is_nullable && !self.is_primary_key
    }

    /// 比較に使用する型名
    ///
    /// PostgreSQLのユーザー定義型は `USER-DEFINED` ではなくUDT名を、
    /// MySQLは完全な型表記を返します。
    pub fn comparable_type(&self) -> &str {
        if self.data_type.eq_ignore_ascii_case("USER-DEFINED") {
            if let Some(udt) = self.udt_name.as_deref() {
                return udt;
            }
        }
        self.column_type.as_deref().unwrap_or(&self.data_type)
    }
}

/// ENUM型
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbEnum {
    pub name: String,
    pub values: Vec<String>,
}

/// インデックス
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbIndex {
    pub name: String,
    pub table_name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    /// プライマリキーを裏付けるインデックス
    pub is_primary: bool,
}

/// 制約
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConstraint {
    pub name: String,
    pub table_name: String,
    /// PRIMARY KEY / FOREIGN KEY / UNIQUE / CHECK
    pub constraint_type: String,
    pub column_name: Option<String>,
    pub foreign_table: Option<String>,
    pub foreign_column: Option<String>,
    pub delete_rule: Option<String>,
    pub update_rule: Option<String>,
    pub check_clause: Option<String>,
}

impl DbConstraint {
    pub fn is_primary_key(&self) -> bool {
        self.constraint_type.eq_ignore_ascii_case("PRIMARY KEY")
    }

    pub fn is_unique(&self) -> bool {
        self.constraint_type.eq_ignore_ascii_case("UNIQUE")
    }

    pub fn is_foreign_key(&self) -> bool {
        self.constraint_type.eq_ignore_ascii_case("FOREIGN KEY")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparable_type_prefers_udt_name() {
        let column = DbColumn {
            name: "status".to_string(),
            data_type: "USER-DEFINED".to_string(),
            udt_name: Some("status_enum".to_string()),
            ..Default::default()
        };
        assert_eq!(column.comparable_type(), "status_enum");
    }

    #[test]
    fn test_comparable_type_prefers_full_column_type() {
        let column = DbColumn {
            name: "name".to_string(),
            data_type: "varchar".to_string(),
            column_type: Some("varchar(255)".to_string()),
            ..Default::default()
        };
        assert_eq!(column.comparable_type(), "varchar(255)");
    }

    #[test]
    fn test_primary_key_column_is_not_nullable() {
        let column = DbColumn {
            is_nullable: true,
            is_primary_key: true,
            ..Default::default()
        };
        assert!(!column.is_effectively_nullable());
    }

    #[test]
    fn test_lookups() {
        let mut schema = DatabaseSchema::new(Dialect::PostgreSQL);
        schema.tables.push(DbTable {
            name: "users".to_string(),
            ..Default::default()
        });
        schema.constraints.push(DbConstraint {
            name: "users_pkey".to_string(),
            table_name: "users".to_string(),
            constraint_type: "PRIMARY KEY".to_string(),
            ..Default::default()
        });
        assert!(schema.table("users").is_some());
        assert!(schema.table("posts").is_none());
        assert_eq!(schema.constraints_for_table("users").count(), 1);
        assert!(schema.constraints[0].is_primary_key());
    }
}
