// スキーマ比較サービス
//
// 望ましいスキーマと実スキーマを比較して構造的な差分を計算します。
// 純粋関数であり、結果のすべての名前リストは昇順にソートされます。

use crate::core::package::{PackageParseResult, SchemaField, TableDirective};
use crate::core::schema::{DatabaseSchema, DbColumn, DbTable};
use crate::core::schema_diff::{ColumnDiff, EnumDiff, SchemaDiff, TableDiff};
use crate::services::type_normalizer::normalize_type;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

/// 比較用に正規化したデフォルト値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedDefault {
    None,
    Literal(String),
    Expression(String),
}

impl std::fmt::Display for NormalizedDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizedDefault::None => write!(f, "NULL"),
            NormalizedDefault::Literal(value) => write!(f, "'{}'", value),
            NormalizedDefault::Expression(expression) => write!(f, "{}", expression),
        }
    }
}

/// 2つのスキーマを比較
///
/// `desired` に近づけるために `actual` に必要な変更を返します。
pub fn compare_schemas(desired: &PackageParseResult, actual: &DatabaseSchema) -> SchemaDiff {
    let mut diff = SchemaDiff::new();

    compare_tables(desired, actual, &mut diff);

    // MySQL系のENUMはカラム型にインライン化されるため独立して比較しない
    if actual.dialect.has_native_enums() {
        compare_enums(desired, actual, &mut diff);
    }

    compare_indexes(desired, actual, &mut diff);

    debug!(
        dialect = %actual.dialect,
        changes = diff.change_count(),
        summary = %diff.summary(),
        "Compared desired and actual schemas"
    );

    diff
}

fn compare_tables(desired: &PackageParseResult, actual: &DatabaseSchema, diff: &mut SchemaDiff) {
    let desired_names: BTreeSet<&str> = desired.tables.iter().map(|t| t.name.as_str()).collect();
    let actual_names: BTreeSet<&str> = actual.tables.iter().map(|t| t.name.as_str()).collect();

    diff.tables_added = desired_names
        .difference(&actual_names)
        .map(|s| s.to_string())
        .collect();
    diff.tables_removed = actual_names
        .difference(&desired_names)
        .map(|s| s.to_string())
        .collect();

    for name in desired_names.intersection(&actual_names) {
        let (Some(directive), Some(table)) = (desired.table_by_name(name), actual.table(name))
        else {
            continue;
        };
        let table_diff = compare_table(desired, directive, table, actual);
        if table_diff.has_changes() {
            diff.tables_modified.push(table_diff);
        }
    }
}

fn compare_table(
    desired: &PackageParseResult,
    directive: &TableDirective,
    table: &DbTable,
    actual: &DatabaseSchema,
) -> TableDiff {
    let mut table_diff = TableDiff::new(&directive.name);

    let fields: Vec<&SchemaField> = desired.fields_for_table(directive).collect();
    let desired_columns: BTreeSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    let actual_columns: BTreeSet<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();

    table_diff.columns_added = desired_columns
        .difference(&actual_columns)
        .map(|s| s.to_string())
        .collect();
    table_diff.columns_removed = actual_columns
        .difference(&desired_columns)
        .map(|s| s.to_string())
        .collect();

    for name in desired_columns.intersection(&actual_columns) {
        let (Some(field), Some(column)) = (
            fields.iter().find(|f| f.name == *name),
            table.column(name),
        ) else {
            continue;
        };
        let column_diff = compare_column(desired, directive, field, column, actual);
        if !column_diff.changes.is_empty() {
            table_diff.columns_modified.push(column_diff);
        }
    }

    table_diff
}

fn compare_column(
    desired: &PackageParseResult,
    directive: &TableDirective,
    field: &SchemaField,
    column: &DbColumn,
    actual: &DatabaseSchema,
) -> ColumnDiff {
    let mut column_diff = ColumnDiff::new(&field.name);
    let dialect = actual.dialect;

    // 型
    let desired_raw = field.type_for(dialect);
    let desired_type = if dialect.is_mysql_family() && desired.enum_by_name(desired_raw).is_some()
    {
        "enum".to_string()
    } else {
        normalize_type(desired_raw)
    };
    let actual_type = normalize_type(column.comparable_type());
    if desired_type != actual_type {
        column_diff.record("type", &actual_type, &desired_type);
    }

    // NULL許可（プライマリキーは両側ともNOT NULLとして扱う）
    let desired_primary = field.primary || directive.primary_key.contains(&field.name);
    let desired_nullable = field.nullable && !desired_primary;
    let actual_nullable = column.is_effectively_nullable();
    if desired_nullable != actual_nullable {
        column_diff.record("nullable", actual_nullable, desired_nullable);
    }

    // ユニーク（両側ともプライマリキーなら一意性は暗黙のため比較しない）
    if !(desired_primary && column.is_primary_key) {
        let desired_unique = field.unique
            || (dialect.is_mysql_family()
                && has_single_column_unique_index(desired, directive, &field.name));
        if desired_unique != column.is_unique {
            column_diff.record("unique", column.is_unique, desired_unique);
        }
    }

    // デフォルト値（自動採番カラムのシーケンス既定値は比較しない）
    if !column.is_auto_increment {
        let boolean = desired_type == "boolean";
        let desired_default = desired_default(field, boolean);
        let actual_default = normalize_default(column.column_default.as_deref(), boolean);
        if desired_default != actual_default {
            column_diff.record("default", &actual_default, &desired_default);
        }
    }

    column_diff
}

fn has_single_column_unique_index(
    desired: &PackageParseResult,
    directive: &TableDirective,
    column: &str,
) -> bool {
    desired
        .indexes_for_table(directive)
        .any(|index| index.unique && index.fields.len() == 1 && index.fields[0] == column)
}

fn compare_enums(desired: &PackageParseResult, actual: &DatabaseSchema, diff: &mut SchemaDiff) {
    let desired_names: BTreeSet<&str> = desired.enums.iter().map(|e| e.name.as_str()).collect();
    let actual_names: BTreeSet<&str> = actual.enums.iter().map(|e| e.name.as_str()).collect();

    diff.enums_added = desired_names
        .difference(&actual_names)
        .map(|s| s.to_string())
        .collect();
    diff.enums_removed = actual_names
        .difference(&desired_names)
        .map(|s| s.to_string())
        .collect();

    for name in desired_names.intersection(&actual_names) {
        let (Some(wanted), Some(existing)) = (desired.enum_by_name(name), actual.enum_type(name))
        else {
            continue;
        };
        let wanted_values: BTreeSet<&str> = wanted.values.iter().map(String::as_str).collect();
        let existing_values: BTreeSet<&str> =
            existing.values.iter().map(String::as_str).collect();

        let enum_diff = EnumDiff {
            enum_name: name.to_string(),
            values_added: wanted_values
                .difference(&existing_values)
                .map(|s| s.to_string())
                .collect(),
            values_removed: existing_values
                .difference(&wanted_values)
                .map(|s| s.to_string())
                .collect(),
        };
        if !enum_diff.values_added.is_empty() || !enum_diff.values_removed.is_empty() {
            diff.enums_modified.push(enum_diff);
        }
    }
}

fn compare_indexes(desired: &PackageParseResult, actual: &DatabaseSchema, diff: &mut SchemaDiff) {
    let desired_names: BTreeSet<&str> = desired.indexes.iter().map(|i| i.name.as_str()).collect();
    let all_actual: BTreeSet<&str> = actual.indexes.iter().map(|i| i.name.as_str()).collect();

    // プライマリキーとUNIQUE制約を裏付けるインデックスは独立したオブジェクトとして扱わない
    let independent: BTreeSet<&str> = actual
        .indexes
        .iter()
        .filter(|index| !index.is_primary)
        .filter(|index| {
            !is_unique_constraint_artifact(desired, actual, &index.name, &index.table_name)
        })
        .map(|index| index.name.as_str())
        .collect();

    diff.indexes_added = desired_names
        .difference(&all_actual)
        .map(|s| s.to_string())
        .collect();
    diff.indexes_removed = independent
        .difference(&desired_names)
        .map(|s| s.to_string())
        .collect();

    for name in &diff.indexes_removed {
        if let Some(index) = actual.index(name) {
            diff.index_tables
                .insert(name.clone(), index.table_name.clone());
        }
    }
}

// UNIQUE制約と同名で、その制約カラムを望ましいスキーマがユニークとしているインデックス
fn is_unique_constraint_artifact(
    desired: &PackageParseResult,
    actual: &DatabaseSchema,
    index_name: &str,
    table_name: &str,
) -> bool {
    let Some(directive) = desired.table_by_name(table_name) else {
        return false;
    };
    actual
        .constraints_for_table(table_name)
        .filter(|c| c.is_unique() && c.name == index_name)
        .filter_map(|c| c.column_name.as_deref())
        .any(|column| {
            desired
                .fields_for_table(directive)
                .any(|f| f.name == column && f.unique)
        })
}

fn desired_default(field: &SchemaField, boolean: bool) -> NormalizedDefault {
    if let Some(expression) = field.default_fn.as_deref().filter(|e| !e.trim().is_empty()) {
        return NormalizedDefault::Expression(canonical_expression(expression));
    }
    match field.default.as_deref() {
        Some(value) if !value.is_empty() && !value.eq_ignore_ascii_case("null") => {
            NormalizedDefault::Literal(canonical_literal(value, boolean))
        }
        _ => NormalizedDefault::None,
    }
}

/// カタログのデフォルト値を正規化
///
/// 型キャスト（`::character varying` 等）と外側の括弧・クォートを取り除きます。
/// 空文字列とNULLは「デフォルトなし」と同一視します。
pub fn normalize_default(raw: Option<&str>, boolean: bool) -> NormalizedDefault {
    let Some(raw) = raw.map(str::trim) else {
        return NormalizedDefault::None;
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return NormalizedDefault::None;
    }

    let mut value = strip_casts(raw);
    while value.starts_with('(') && value.ends_with(')') && value.len() >= 2 {
        value = value[1..value.len() - 1].trim().to_string();
    }
    let value = strip_casts(&value);

    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        let inner = value[1..value.len() - 1].replace("''", "'");
        if inner.is_empty() {
            return NormalizedDefault::None;
        }
        return NormalizedDefault::Literal(canonical_literal(&inner, boolean));
    }

    if value.eq_ignore_ascii_case("null") {
        return NormalizedDefault::None;
    }

    if is_expression(&value) {
        NormalizedDefault::Expression(canonical_expression(&value))
    } else {
        NormalizedDefault::Literal(canonical_literal(&value, boolean))
    }
}

// `'x'::character varying` や `'{}'::text[]` の型キャスト部分
static CAST_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"::[A-Za-z_][A-Za-z0-9_ ]*(\[\])?").expect("Invalid cast suffix regex")
});

fn strip_casts(value: &str) -> String {
    CAST_SUFFIX.replace_all(value, "").trim().to_string()
}

fn is_expression(value: &str) -> bool {
    let lowered = value.to_ascii_lowercase();
    value.contains('(')
        || matches!(
            lowered.as_str(),
            "current_timestamp" | "current_date" | "current_time" | "localtimestamp" | "localtime"
        )
}

fn canonical_expression(expression: &str) -> String {
    let compact: String = expression
        .to_ascii_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    match compact.as_str() {
        "now()" | "current_timestamp" | "current_timestamp()" | "localtimestamp"
        | "localtimestamp()" => "current_timestamp".to_string(),
        _ => compact,
    }
}

fn canonical_literal(value: &str, boolean: bool) -> String {
    if boolean {
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "t" => return "true".to_string(),
            "0" | "false" | "f" => return "false".to_string(),
            _ => {}
        }
    }
    value.to_string()
}
