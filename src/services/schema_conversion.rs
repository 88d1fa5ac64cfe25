// スキーマ変換サービス
//
// 望ましいスキーマ（PackageParseResult）をビルダー経由でASTノード列に変換します。
// 方言ごとのオーバーライドはこの段階で解決されます。

use crate::adapters::renderer::{MySqlRenderer, PostgresRenderer, Renderer};
use crate::core::ast::{ColumnNode, Node};
use crate::core::builder::{ColumnBuilder, SchemaBuilder};
use crate::core::config::Dialect;
use crate::core::package::{PackageParseResult, SchemaField, TableDirective};
use crate::services::dependency_order::creation_order;
use std::collections::{BTreeMap, BTreeSet};

/// テーブル間の外部キー依存関係（テーブル名 → 参照先テーブル名）
pub fn table_dependencies(desired: &PackageParseResult) -> BTreeMap<String, BTreeSet<String>> {
    desired
        .tables
        .iter()
        .map(|table| {
            let refs = desired
                .fields_for_table(table)
                .filter_map(|field| field.foreign_reference().map(|(t, _)| t))
                .collect();
            (table.name.clone(), refs)
        })
        .collect()
}

/// 作成順に並べたテーブル宣言
pub fn ordered_tables(desired: &PackageParseResult) -> Vec<&TableDirective> {
    creation_order(&table_dependencies(desired))
        .iter()
        .filter_map(|name| desired.table_by_name(name))
        .collect()
}

/// スキーマ全体をノード列に変換
///
/// ENUM、依存順のテーブル（各テーブルの直後にそのインデックス）の順に並びます。
pub fn build_schema_nodes(desired: &PackageParseResult, dialect: Dialect) -> Vec<Node> {
    let mut builder = SchemaBuilder::new();
    for enum_def in &desired.enums {
        let values: Vec<&str> = enum_def.values.iter().map(String::as_str).collect();
        builder = builder.enumeration(enum_def.name.clone(), &values);
    }

    let mut nodes = builder.build();
    for table in ordered_tables(desired) {
        nodes.extend(build_table_nodes(desired, table, dialect));
    }
    nodes
}

/// 単一テーブルをCREATE TABLEノードとそのインデックスノードに変換
pub fn build_table_nodes(
    desired: &PackageParseResult,
    table: &TableDirective,
    dialect: Dialect,
) -> Vec<Node> {
    let mut builder = SchemaBuilder::new().table(table.name.clone());

    if let Some(comment) = &table.comment {
        builder = builder.comment(comment.clone());
    }
    if dialect.is_mysql_family() {
        if let Some(engine) = &table.engine {
            builder = builder.option("engine", engine.clone());
        }
    }
    // テーブルオプションは対象方言のオーバーライドのみ
    if let Some(options) = table.overrides.get(dialect.name()) {
        for (key, value) in options {
            builder = builder.option(key.clone(), value.clone());
        }
    }

    for field in desired.fields_for_table(table) {
        builder = apply_field(builder.column(field.name.clone(), field.field_type.clone()), field)
            .end();
    }

    if !table.primary_key.is_empty() {
        let columns: Vec<&str> = table.primary_key.iter().map(String::as_str).collect();
        builder = builder.primary_key(&columns);
    }

    for index in desired.indexes_for_table(table) {
        let columns: Vec<&str> = index.fields.iter().map(String::as_str).collect();
        let mut index_builder = builder.index(index.name.clone(), &columns);
        if index.unique {
            index_builder = index_builder.unique();
        }
        builder = index_builder.end();
    }

    builder.end().build()
}

/// フィールド宣言を単独のカラム定義に変換（ADD COLUMN用）
pub fn build_column(table_name: &str, field: &SchemaField) -> ColumnNode {
    let builder = SchemaBuilder::new()
        .table(table_name)
        .column(field.name.clone(), field.field_type.clone());
    apply_field(builder, field).into_column()
}

/// 望ましいスキーマのENUMを知っているレンダラーを作成
pub fn renderer_for(desired: &PackageParseResult, dialect: Dialect) -> Box<dyn Renderer> {
    match dialect {
        Dialect::PostgreSQL => Box::new(PostgresRenderer::new()),
        Dialect::MySQL | Dialect::MariaDB => Box::new(
            MySqlRenderer::new(dialect).with_enums(
                desired
                    .enums
                    .iter()
                    .map(|e| (e.name.clone(), e.values.clone())),
            ),
        ),
    }
}

fn apply_field(mut column: ColumnBuilder, field: &SchemaField) -> ColumnBuilder {
    column = if field.nullable {
        column.nullable()
    } else {
        column.not_null()
    };
    if field.primary {
        column = column.primary();
    }
    if field.auto_inc {
        column = column.auto_increment();
    }
    if field.unique {
        column = column.unique();
    }

    if let Some(expression) = &field.default_fn {
        column = column.default_function(expression.clone());
    } else if let Some(value) = &field.default {
        column = column.default_value(value.clone());
    }

    if let Some(check) = &field.check {
        column = column.check(check.clone());
    }
    if let Some(comment) = &field.comment {
        column = column.comment(comment.clone());
    }

    if let Some((table, referenced)) = field.foreign_reference() {
        column = column.foreign_key(table, referenced);
        if let Some(name) = &field.foreign_key_name {
            column = column.foreign_key_name(name.clone());
        }
        if let Some(action) = &field.on_delete {
            column = column.on_delete(action.clone());
        }
        if let Some(action) = &field.on_update {
            column = column.on_update(action.clone());
        }
    }

    // 型オーバーライドは全方言分を保持し、レンダラーが自分の方言を選ぶ
    for (dialect, overrides) in &field.overrides {
        if let Some(column_type) = overrides.get("type") {
            column = column.type_override(dialect.clone(), column_type.clone());
        }
    }

    column
}
