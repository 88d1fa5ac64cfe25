// PostgreSQL イントロスペクター
//
// information_schema と pg_catalog からスキーマ情報を取得します。
// Anyドライバーで扱えるよう、識別子型や数値型は text / bigint にキャストします。

use super::{is_yes, non_empty, DatabaseIntrospector};
use crate::core::schema::{DbColumn, DbConstraint, DbEnum, DbIndex, DbTable};
use async_trait::async_trait;
use regex::Regex;
use sqlx::{AnyPool, Row};
use std::sync::LazyLock;

/// PostgreSQL用イントロスペクター
pub struct PostgresIntrospector;

/// シーケンスによる自動採番のデフォルト値かどうか
///
/// # Examples
/// ```
/// use ptah::adapters::schema_reader::is_sequence_default;
/// assert!(is_sequence_default("nextval('users_id_seq'::regclass)"));
/// assert!(!is_sequence_default("now()"));
/// ```
pub fn is_sequence_default(default: &str) -> bool {
    SEQUENCE_DEFAULT.is_match(default.trim())
}

static SEQUENCE_DEFAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^nextval\('[^']*_seq'(::regclass)?\)$").expect("Invalid sequence default regex")
});

#[async_trait]
impl DatabaseIntrospector for PostgresIntrospector {
    async fn read_tables(&self, pool: &AnyPool, schema: &str) -> Result<Vec<DbTable>, sqlx::Error> {
        let sql = r#"
            SELECT
                c.relname::text AS table_name,
                'BASE TABLE'::text AS table_type,
                obj_description(c.oid, 'pg_class')::text AS table_comment
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1
                AND c.relkind IN ('r', 'p')
            ORDER BY c.relname
        "#;

        let rows = sqlx::query(sql).bind(schema).fetch_all(pool).await?;
        rows.iter()
            .map(|row| {
                Ok(DbTable {
                    name: row.try_get(0)?,
                    table_type: row.try_get(1)?,
                    comment: non_empty(row.try_get(2)?),
                    columns: Vec::new(),
                })
            })
            .collect()
    }

    async fn read_columns(
        &self,
        pool: &AnyPool,
        schema: &str,
        table: &str,
    ) -> Result<Vec<DbColumn>, sqlx::Error> {
        let sql = r#"
            SELECT
                c.column_name::text,
                c.data_type::text,
                c.udt_name::text,
                c.is_nullable::text,
                c.column_default::text,
                c.character_maximum_length::bigint,
                c.numeric_precision::bigint,
                c.numeric_scale::bigint,
                c.ordinal_position::bigint,
                c.is_identity::text,
                col_description(a.attrelid, a.attnum)::text AS column_comment
            FROM information_schema.columns c
            JOIN pg_namespace n ON n.nspname = c.table_schema
            JOIN pg_class t ON t.relnamespace = n.oid AND t.relname = c.table_name
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name
            WHERE c.table_schema = $1
                AND c.table_name = $2
            ORDER BY c.ordinal_position
        "#;

        let rows = sqlx::query(sql)
            .bind(schema)
            .bind(table)
            .fetch_all(pool)
            .await?;

        rows.iter()
            .map(|row| {
                let column_default: Option<String> = row.try_get(4)?;
                let is_identity: Option<String> = row.try_get(9)?;
                let is_auto_increment = column_default
                    .as_deref()
                    .is_some_and(is_sequence_default)
                    || is_identity.as_deref().is_some_and(is_yes);

                Ok(DbColumn {
                    name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                    udt_name: row.try_get(2)?,
                    column_type: None,
                    is_nullable: is_yes(&row.try_get::<String, _>(3)?),
                    column_default,
                    character_maximum_length: row.try_get(5)?,
                    numeric_precision: row.try_get(6)?,
                    numeric_scale: row.try_get(7)?,
                    ordinal_position: row.try_get(8)?,
                    is_auto_increment,
                    is_primary_key: false,
                    is_unique: false,
                    comment: non_empty(row.try_get(10)?),
                })
            })
            .collect()
    }

    async fn read_enums(&self, pool: &AnyPool, schema: &str) -> Result<Vec<DbEnum>, sqlx::Error> {
        let sql = r#"
            SELECT t.typname::text, e.enumlabel::text
            FROM pg_type t
            JOIN pg_enum e ON t.oid = e.enumtypid
            JOIN pg_namespace n ON n.oid = t.typnamespace
            WHERE n.nspname = $1
            ORDER BY t.typname, e.enumsortorder
        "#;

        let rows = sqlx::query(sql).bind(schema).fetch_all(pool).await?;

        // 型名順・定義順に並んでいるので連続する行をまとめる
        let mut enums: Vec<DbEnum> = Vec::new();
        for row in &rows {
            let name: String = row.try_get(0)?;
            let value: String = row.try_get(1)?;
            match enums.last_mut() {
                Some(last) if last.name == name => last.values.push(value),
                _ => enums.push(DbEnum {
                    name,
                    values: vec![value],
                }),
            }
        }

        Ok(enums)
    }

    async fn read_indexes(
        &self,
        pool: &AnyPool,
        schema: &str,
    ) -> Result<Vec<DbIndex>, sqlx::Error> {
        // UNIQUE制約が作成したインデックスは制約として扱う
        let sql = r#"
            SELECT
                i.relname::text AS index_name,
                t.relname::text AS table_name,
                a.attname::text AS column_name,
                ix.indisunique,
                ix.indisprimary
            FROM pg_index ix
            JOIN pg_class t ON t.oid = ix.indrelid
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_namespace n ON n.oid = t.relnamespace
            CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
            WHERE n.nspname = $1
                AND t.relkind IN ('r', 'p')
                AND NOT EXISTS (
                    SELECT 1 FROM pg_constraint con
                    WHERE con.conindid = ix.indexrelid AND con.contype = 'u'
                )
            ORDER BY t.relname, i.relname, k.ord
        "#;

        let rows = sqlx::query(sql).bind(schema).fetch_all(pool).await?;

        let mut indexes: Vec<DbIndex> = Vec::new();
        for row in &rows {
            let name: String = row.try_get(0)?;
            let table_name: String = row.try_get(1)?;
            let column: String = row.try_get(2)?;
            match indexes.last_mut() {
                Some(last) if last.name == name && last.table_name == table_name => {
                    last.columns.push(column)
                }
                _ => indexes.push(DbIndex {
                    name,
                    table_name,
                    columns: vec![column],
                    is_unique: row.try_get(3)?,
                    is_primary: row.try_get(4)?,
                }),
            }
        }

        Ok(indexes)
    }

    async fn read_constraints(
        &self,
        pool: &AnyPool,
        schema: &str,
    ) -> Result<Vec<DbConstraint>, sqlx::Error> {
        // NOT NULL は information_schema 上 CHECK 制約として現れるため除外
        let sql = r#"
            SELECT
                tc.constraint_name::text,
                tc.table_name::text,
                tc.constraint_type::text,
                kcu.column_name::text,
                ccu.table_name::text AS foreign_table,
                ccu.column_name::text AS foreign_column,
                rc.delete_rule::text,
                rc.update_rule::text,
                cc.check_clause::text
            FROM information_schema.table_constraints tc
            LEFT JOIN information_schema.key_column_usage kcu
                ON kcu.constraint_name = tc.constraint_name
                AND kcu.constraint_schema = tc.constraint_schema
                AND kcu.table_name = tc.table_name
            LEFT JOIN information_schema.referential_constraints rc
                ON rc.constraint_name = tc.constraint_name
                AND rc.constraint_schema = tc.constraint_schema
            LEFT JOIN information_schema.constraint_column_usage ccu
                ON tc.constraint_type = 'FOREIGN KEY'
                AND ccu.constraint_name = tc.constraint_name
                AND ccu.constraint_schema = tc.constraint_schema
            LEFT JOIN information_schema.check_constraints cc
                ON tc.constraint_type = 'CHECK'
                AND cc.constraint_name = tc.constraint_name
                AND cc.constraint_schema = tc.constraint_schema
            WHERE tc.table_schema = $1
                AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE', 'FOREIGN KEY', 'CHECK')
                AND tc.constraint_name::text NOT LIKE '%\_not\_null'
            ORDER BY tc.table_name, tc.constraint_name, kcu.ordinal_position
        "#;

        let rows = sqlx::query(sql).bind(schema).fetch_all(pool).await?;
        rows.iter()
            .map(|row| {
                Ok(DbConstraint {
                    name: row.try_get(0)?,
                    table_name: row.try_get(1)?,
                    constraint_type: row.try_get(2)?,
                    column_name: row.try_get(3)?,
                    foreign_table: row.try_get(4)?,
                    foreign_column: row.try_get(5)?,
                    delete_rule: row.try_get(6)?,
                    update_rule: row.try_get(7)?,
                    check_clause: row.try_get(8)?,
                })
            })
            .collect()
    }

    async fn read_sequences(
        &self,
        pool: &AnyPool,
        schema: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        let sql = r#"
            SELECT sequence_name::text
            FROM information_schema.sequences
            WHERE sequence_schema = $1
            ORDER BY sequence_name
        "#;

        let rows = sqlx::query(sql).bind(schema).fetch_all(pool).await?;
        rows.iter().map(|row| row.try_get(0)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_defaults_are_auto_increment() {
        assert!(is_sequence_default("nextval('users_id_seq'::regclass)"));
        assert!(is_sequence_default("nextval('public.users_id_seq'::regclass)"));
        assert!(is_sequence_default("  nextval('orders_id_seq')  "));
    }

    #[test]
    fn test_other_defaults_are_not_auto_increment() {
        assert!(!is_sequence_default("0"));
        assert!(!is_sequence_default("'active'::status_enum"));
        assert!(!is_sequence_default("nextval('custom_counter'::regclass)"));
        assert!(!is_sequence_default("CURRENT_TIMESTAMP"));
    }
}
