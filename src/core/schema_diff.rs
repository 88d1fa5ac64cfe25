// スキーマ差分モデル
//
// 望ましいスキーマと実スキーマの構造的な差分を表現します。
// すべての名前リストは昇順にソートされます。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// スキーマ差分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub tables_added: Vec<String>,
    pub tables_removed: Vec<String>,
    pub tables_modified: Vec<TableDiff>,
    pub enums_added: Vec<String>,
    pub enums_removed: Vec<String>,
    pub enums_modified: Vec<EnumDiff>,
    pub indexes_added: Vec<String>,
    pub indexes_removed: Vec<String>,
    /// 削除されるインデックスの所属テーブル
    pub index_tables: BTreeMap<String, String>,
}

impl SchemaDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// 差分があるかどうか
    pub fn has_changes(&self) -> bool {
        !self.tables_added.is_empty()
            || !self.tables_removed.is_empty()
            || !self.tables_modified.is_empty()
            || !self.enums_added.is_empty()
            || !self.enums_removed.is_empty()
            || !self.enums_modified.is_empty()
            || !self.indexes_added.is_empty()
            || !self.indexes_removed.is_empty()
    }

    /// 変更件数の合計
    pub fn change_count(&self) -> usize {
        self.tables_added.len()
            + self.tables_removed.len()
            + self.tables_modified.len()
            + self.enums_added.len()
            + self.enums_removed.len()
            + self.enums_modified.len()
            + self.indexes_added.len()
            + self.indexes_removed.len()
    }

    /// 一行のサマリー
    pub fn summary(&self) -> String {
        if !self.has_changes() {
            return "No changes".to_string();
        }

        let parts: Vec<String> = [
            ("tables added", self.tables_added.len()),
            ("tables removed", self.tables_removed.len()),
            ("tables modified", self.tables_modified.len()),
            ("enums added", self.enums_added.len()),
            ("enums removed", self.enums_removed.len()),
            ("enums modified", self.enums_modified.len()),
            ("indexes added", self.indexes_added.len()),
            ("indexes removed", self.indexes_removed.len()),
        ]
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(label, count)| format!("{} {}", count, label))
        .collect();

        parts.join(", ")
    }

    /// 破壊的な変更（手動対応が必要なもの）を含むかどうか
    pub fn has_destructive_changes(&self) -> bool {
        !self.tables_removed.is_empty()
            || !self.enums_removed.is_empty()
            || self.enums_modified.iter().any(|e| !e.values_removed.is_empty())
            || self
                .tables_modified
                .iter()
                .any(|t| !t.columns_removed.is_empty() || !t.columns_modified.is_empty())
    }
}

/// テーブル差分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDiff {
    pub table_name: String,
    pub columns_added: Vec<String>,
    pub columns_removed: Vec<String>,
    pub columns_modified: Vec<ColumnDiff>,
}

impl TableDiff {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.columns_added.is_empty()
            || !self.columns_removed.is_empty()
            || !self.columns_modified.is_empty()
    }
}

/// カラム差分
///
/// 変更の種類（"type", "nullable", "unique", "default"）をキーに、
/// `"old -> new"` 形式の文字列を保持します。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDiff {
    pub column_name: String,
    pub changes: BTreeMap<String, String>,
}

impl ColumnDiff {
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            changes: BTreeMap::new(),
        }
    }

    /// 変更を記録
    pub fn record(&mut self, kind: &str, old: impl std::fmt::Display, new: impl std::fmt::Display) {
        self.changes
            .insert(kind.to_string(), format!("{} -> {}", old, new));
    }
}

/// ENUM差分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDiff {
    pub enum_name: String,
    pub values_added: Vec<String>,
    pub values_removed: Vec<String>,
}
