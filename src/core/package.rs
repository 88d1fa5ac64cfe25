// 望ましいスキーマの入力モデル
//
// 外部のエンティティパーサーが生成するテーブル・フィールド・インデックス・ENUMの
// 記述を保持します。コアはこの型付き記述のみを消費します。

use crate::core::config::Dialect;
use crate::core::error::PtahError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 方言名 → (キー → 値) のオーバーライド
pub type DialectOverrides = BTreeMap<String, BTreeMap<String, String>>;

/// パース済みパッケージ（望ましいスキーマ）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageParseResult {
    pub tables: Vec<TableDirective>,
    pub fields: Vec<SchemaField>,
    pub indexes: Vec<SchemaIndex>,
    pub enums: Vec<GlobalEnum>,
}

/// テーブル宣言
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDirective {
    /// 宣言元の構造体名（フィールドとの紐付けキー）
    pub struct_name: String,
    /// テーブル名
    pub name: String,
    pub comment: Option<String>,
    /// 複合プライマリキー
    pub primary_key: Vec<String>,
    /// ストレージエンジン（MySQL系）
    pub engine: Option<String>,
    pub overrides: DialectOverrides,
}

/// フィールド宣言
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaField {
    pub struct_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub nullable: bool,
    pub primary: bool,
    pub auto_inc: bool,
    pub unique: bool,
    /// リテラルのデフォルト値
    pub default: Option<String>,
    /// 関数式のデフォルト値
    pub default_fn: Option<String>,
    /// 外部キー参照（`table(column)` 形式）
    pub foreign: Option<String>,
    pub foreign_key_name: Option<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
    pub check: Option<String>,
    pub comment: Option<String>,
    pub overrides: DialectOverrides,
}

impl SchemaField {
    /// 外部キー参照を (テーブル, カラム) に分解
    ///
    /// カラムが省略された場合は `id` を参照します。
    pub fn foreign_reference(&self) -> Option<(String, String)> {
        let raw = self.foreign.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.split_once('(') {
            Some((table, rest)) => {
                let column = rest.trim_end_matches(')').trim();
                let column = if column.is_empty() { "id" } else { column };
                Some((table.trim().to_string(), column.to_string()))
            }
            None => Some((raw.to_string(), "id".to_string())),
        }
    }

    /// 方言に応じた型（オーバーライド優先）
    pub fn type_for(&self, dialect: Dialect) -> &str {
        self.overrides
            .get(dialect.name())
            .and_then(|o| o.get("type"))
            .map(String::as_str)
            .unwrap_or(&self.field_type)
    }
}

/// インデックス宣言
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaIndex {
    pub struct_name: String,
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
    pub comment: Option<String>,
}

/// グローバルENUM宣言
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalEnum {
    pub name: String,
    pub values: Vec<String>,
}

impl PackageParseResult {
    /// JSONドキュメントから読み込む
    pub fn from_json(json: &str) -> Result<Self, PtahError> {
        serde_json::from_str(json).map_err(|e| PtahError::Parse {
            message: e.to_string(),
        })
    }

    /// テーブル名で検索
    pub fn table_by_name(&self, name: &str) -> Option<&TableDirective> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// テーブルに属するフィールド（宣言順）
    pub fn fields_for_table<'a>(
        &'a self,
        table: &'a TableDirective,
    ) -> impl Iterator<Item = &'a SchemaField> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.struct_name == table.struct_name)
    }

    /// テーブルに属するインデックス
    pub fn indexes_for_table<'a>(
        &'a self,
        table: &'a TableDirective,
    ) -> impl Iterator<Item = &'a SchemaIndex> + 'a {
        self.indexes
            .iter()
            .filter(move |i| i.struct_name == table.struct_name)
    }

    /// インデックスを所属テーブルとともに検索
    pub fn index_by_name(&self, name: &str) -> Option<(&SchemaIndex, &TableDirective)> {
        self.indexes.iter().find(|i| i.name == name).and_then(|index| {
            self.tables
                .iter()
                .find(|t| t.struct_name == index.struct_name)
                .map(|table| (index, table))
        })
    }

    /// ENUM名で検索
    pub fn enum_by_name(&self, name: &str) -> Option<&GlobalEnum> {
        self.enums.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "tables": [{"struct_name": "User", "name": "users", "comment": "accounts"}],
        "fields": [
            {"struct_name": "User", "name": "id", "type": "SERIAL", "primary": true},
            {"struct_name": "User", "name": "status", "type": "status_enum",
             "overrides": {"mysql": {"type": "VARCHAR(16)"}}},
            {"struct_name": "Post", "name": "user_id", "type": "INTEGER", "foreign": "users(id)"}
        ],
        "indexes": [{"struct_name": "User", "name": "idx_users_status", "fields": ["status"]}],
        "enums": [{"name": "status_enum", "values": ["active", "inactive"]}]
    }"#;

    #[test]
    fn test_from_json() {
        let result = PackageParseResult::from_json(SAMPLE).unwrap();
        let users = result.table_by_name("users").unwrap();
        let fields: Vec<_> = result.fields_for_table(users).map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["id", "status"]);
        assert_eq!(result.indexes_for_table(users).count(), 1);
        assert_eq!(result.enum_by_name("status_enum").unwrap().values.len(), 2);
        assert!(!result.fields[0].nullable);
    }

    #[test]
    fn test_from_json_reports_parse_error() {
        let error = PackageParseResult::from_json("{\"tables\": 3}").unwrap_err();
        assert!(error.is_parse());
    }

    #[test]
    fn test_type_for_uses_dialect_override() {
        let result = PackageParseResult::from_json(SAMPLE).unwrap();
        let status = &result.fields[1];
        assert_eq!(status.type_for(Dialect::MySQL), "VARCHAR(16)");
        assert_eq!(status.type_for(Dialect::PostgreSQL), "status_enum");
    }

    #[test]
    fn test_foreign_reference() {
        let mut field = SchemaField {
            foreign: Some("users(id)".to_string()),
            ..Default::default()
        };
        assert_eq!(
            field.foreign_reference(),
            Some(("users".to_string(), "id".to_string()))
        );

        field.foreign = Some("accounts".to_string());
        assert_eq!(
            field.foreign_reference(),
            Some(("accounts".to_string(), "id".to_string()))
        );

        field.foreign = None;
        assert_eq!(field.foreign_reference(), None);
    }

    #[test]
    fn test_index_by_name() {
        let result = PackageParseResult::from_json(SAMPLE).unwrap();
        let (index, table) = result.index_by_name("idx_users_status").unwrap();
        assert_eq!(index.fields, vec!["status"]);
        assert_eq!(table.name, "users");
        assert!(result.index_by_name("missing").is_none());
    }
}
