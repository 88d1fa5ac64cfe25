// スキーマリーダー
//
// 稼働中のデータベースのカタログを読み取り、DatabaseSchema を組み立てます。
// 方言固有のカタログクエリは DatabaseIntrospector の実装が担当します。

mod mysql;
mod postgres;

pub use mysql::{parse_enum_values, synthesize_enum_name, MySqlIntrospector};
pub use postgres::{is_sequence_default, PostgresIntrospector};

use crate::core::config::Dialect;
use crate::core::error::{IntrospectionPhase, PtahError};
use crate::core::schema::{DatabaseSchema, DbColumn, DbConstraint, DbEnum, DbIndex, DbTable};
use async_trait::async_trait;
use sqlx::AnyPool;
use std::collections::BTreeMap;
use tracing::debug;

/// データベースカタログ取得インターフェース
///
/// `schema` はPostgreSQLではスキーマ名、MySQL系ではデータベース名です。
#[async_trait]
pub trait DatabaseIntrospector: Send + Sync {
    /// テーブル一覧（カラムは空）
    async fn read_tables(&self, pool: &AnyPool, schema: &str) -> Result<Vec<DbTable>, sqlx::Error>;

    /// テーブルのカラム情報（定義順）
    async fn read_columns(
        &self,
        pool: &AnyPool,
        schema: &str,
        table: &str,
    ) -> Result<Vec<DbColumn>, sqlx::Error>;

    /// ENUM型
    async fn read_enums(&self, pool: &AnyPool, schema: &str) -> Result<Vec<DbEnum>, sqlx::Error>;

    /// インデックス（UNIQUE制約を裏付けるものは含まない）
    async fn read_indexes(&self, pool: &AnyPool, schema: &str)
        -> Result<Vec<DbIndex>, sqlx::Error>;

    /// 制約（複数カラムの制約はカラムごとに1行）
    async fn read_constraints(
        &self,
        pool: &AnyPool,
        schema: &str,
    ) -> Result<Vec<DbConstraint>, sqlx::Error>;

    /// シーケンス名（PostgreSQL専用、他方言では空を返す）
    async fn read_sequences(
        &self,
        _pool: &AnyPool,
        _schema: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        Ok(Vec::new())
    }
}

/// 方言に応じたイントロスペクターを作成
pub fn create_introspector(dialect: Dialect) -> Box<dyn DatabaseIntrospector> {
    match dialect {
        Dialect::PostgreSQL => Box::new(PostgresIntrospector),
        Dialect::MySQL | Dialect::MariaDB => Box::new(MySqlIntrospector),
    }
}

/// スキーマリーダー
#[derive(Debug, Clone)]
pub struct SchemaReader {
    pool: AnyPool,
    dialect: Dialect,
    schema_name: String,
}

impl SchemaReader {
    pub fn new(pool: AnyPool, dialect: Dialect, schema_name: impl Into<String>) -> Self {
        Self {
            pool,
            dialect,
            schema_name: schema_name.into(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// スキーマ全体を読み取る
    ///
    /// いずれかのクエリが失敗した時点で、失敗したフェーズ名付きのエラーを返します。
    /// 途中まで読み取ったスキーマは返しません。
    pub async fn read_schema(&self) -> Result<DatabaseSchema, PtahError> {
        let introspector = create_introspector(self.dialect);
        let pool = &self.pool;
        let schema = self.schema_name.as_str();

        let mut tables = introspector
            .read_tables(pool, schema)
            .await
            .map_err(|e| PtahError::introspection(IntrospectionPhase::Tables, e))?;
        debug!(schema, count = tables.len(), "Read tables");

        for table in &mut tables {
            table.columns = introspector
                .read_columns(pool, schema, &table.name)
                .await
                .map_err(|e| {
                    PtahError::introspection(
                        IntrospectionPhase::Columns,
                        format!("{}: {}", table.name, e),
                    )
                })?;
        }
        debug!(
            schema,
            count = tables.iter().map(|t| t.columns.len()).sum::<usize>(),
            "Read columns"
        );

        let enums = introspector
            .read_enums(pool, schema)
            .await
            .map_err(|e| PtahError::introspection(IntrospectionPhase::Enums, e))?;
        debug!(schema, count = enums.len(), "Read enums");

        let indexes = introspector
            .read_indexes(pool, schema)
            .await
            .map_err(|e| PtahError::introspection(IntrospectionPhase::Indexes, e))?;
        debug!(schema, count = indexes.len(), "Read indexes");

        let constraints = introspector
            .read_constraints(pool, schema)
            .await
            .map_err(|e| PtahError::introspection(IntrospectionPhase::Constraints, e))?;
        debug!(schema, count = constraints.len(), "Read constraints");

        merge_constraint_flags(&mut tables, &constraints);

        Ok(DatabaseSchema {
            dialect: self.dialect,
            tables,
            enums,
            indexes,
            constraints,
        })
    }
}

/// 制約から得たPRIMARY KEY / UNIQUE フラグをカラムに反映する
///
/// UNIQUEは単一カラムの制約だけを反映します。
pub fn merge_constraint_flags(tables: &mut [DbTable], constraints: &[DbConstraint]) {
    let mut widths: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for constraint in constraints {
        *widths
            .entry((constraint.table_name.as_str(), constraint.name.as_str()))
            .or_default() += 1;
    }

    for constraint in constraints {
        let Some(column_name) = constraint.column_name.as_deref() else {
            continue;
        };
        let Some(column) = tables
            .iter_mut()
            .find(|t| t.name == constraint.table_name)
            .and_then(|t| t.columns.iter_mut().find(|c| c.name == column_name))
        else {
            continue;
        };

        if constraint.is_primary_key() {
            column.is_primary_key = true;
        } else if constraint.is_unique() {
            let width = widths
                .get(&(constraint.table_name.as_str(), constraint.name.as_str()))
                .copied()
                .unwrap_or(0);
            if width == 1 {
                column.is_unique = true;
            }
        }
    }
}

// 空文字列をNoneとして扱う
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub(crate) fn is_yes(value: &str) -> bool {
    value.eq_ignore_ascii_case("YES")
}
