// MySQL / MariaDB イントロスペクター
//
// information_schema からスキーマ情報を取得します。
// MySQLには名前付きENUM型がないため、`enum(...)` カラム型から値を取り出し、
// 値の並びから名前を合成します。

use super::{is_yes, non_empty, DatabaseIntrospector};
use crate::core::schema::{DbColumn, DbConstraint, DbEnum, DbIndex, DbTable};
use async_trait::async_trait;
use sqlx::{AnyPool, Row};
use std::collections::BTreeMap;

/// MySQL/MariaDB用イントロスペクター
pub struct MySqlIntrospector;

/// `enum('a','b')` 形式のカラム型から値を取り出す
///
/// 引用符の二重化（`''`）とバックスラッシュエスケープを解釈します。
/// ENUM型でない場合は空のベクタを返します。
///
/// # Examples
/// ```
/// use ptah::adapters::schema_reader::parse_enum_values;
/// assert_eq!(parse_enum_values("enum('active','inactive')"), vec!["active", "inactive"]);
/// assert!(parse_enum_values("varchar(255)").is_empty());
/// ```
pub fn parse_enum_values(column_type: &str) -> Vec<String> {
    let trimmed = column_type.trim();
    let Some(body) = trimmed
        .get(..5)
        .filter(|prefix| prefix.eq_ignore_ascii_case("enum("))
        .and_then(|_| trimmed[5..].strip_suffix(')'))
    else {
        return Vec::new();
    };

    let mut values = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut value = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\'' if chars.peek() == Some(&'\'') => {
                    chars.next();
                    value.push('\'');
                }
                '\'' => break,
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                }
                other => value.push(other),
            }
        }
        values.push(value);
    }
    values
}

/// ENUM値の並びから型名を合成する（`enum_` + ソート済みの値を `_` で連結）
pub fn synthesize_enum_name(values: &[String]) -> String {
    let mut sorted: Vec<&str> = values.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!("enum_{}", sorted.join("_"))
}

#[async_trait]
impl DatabaseIntrospector for MySqlIntrospector {
    async fn read_tables(&self, pool: &AnyPool, schema: &str) -> Result<Vec<DbTable>, sqlx::Error> {
        let sql = r#"
            SELECT
                CAST(TABLE_NAME AS CHAR),
                CAST(TABLE_TYPE AS CHAR),
                CAST(TABLE_COMMENT AS CHAR)
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = ?
                AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
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
                CAST(COLUMN_NAME AS CHAR),
                CAST(DATA_TYPE AS CHAR),
                CAST(COLUMN_TYPE AS CHAR),
                CAST(IS_NULLABLE AS CHAR),
                CAST(COLUMN_DEFAULT AS CHAR),
                CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED),
                CAST(NUMERIC_PRECISION AS SIGNED),
                CAST(NUMERIC_SCALE AS SIGNED),
                CAST(ORDINAL_POSITION AS SIGNED),
                CAST(EXTRA AS CHAR),
                CAST(COLUMN_COMMENT AS CHAR)
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ?
                AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows = sqlx::query(sql)
            .bind(schema)
            .bind(table)
            .fetch_all(pool)
            .await?;

        rows.iter()
            .map(|row| {
                let extra: Option<String> = row.try_get(9)?;
                Ok(DbColumn {
                    name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                    udt_name: None,
                    column_type: row.try_get(2)?,
                    is_nullable: is_yes(&row.try_get::<String, _>(3)?),
                    column_default: row.try_get(4)?,
                    character_maximum_length: row.try_get(5)?,
                    numeric_precision: row.try_get(6)?,
                    numeric_scale: row.try_get(7)?,
                    ordinal_position: row.try_get(8)?,
                    is_auto_increment: extra
                        .is_some_and(|e| e.to_ascii_lowercase().contains("auto_increment")),
                    is_primary_key: false,
                    is_unique: false,
                    comment: non_empty(row.try_get(10)?),
                })
            })
            .collect()
    }

    async fn read_enums(&self, pool: &AnyPool, schema: &str) -> Result<Vec<DbEnum>, sqlx::Error> {
        let sql = r#"
            SELECT DISTINCT CAST(COLUMN_TYPE AS CHAR)
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ?
                AND DATA_TYPE = 'enum'
        "#;

        let rows = sqlx::query(sql).bind(schema).fetch_all(pool).await?;

        // 同じ値集合のENUMは1つにまとめる
        let mut enums: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in &rows {
            let column_type: String = row.try_get(0)?;
            let values = parse_enum_values(&column_type);
            if values.is_empty() {
                continue;
            }
            enums.entry(synthesize_enum_name(&values)).or_insert(values);
        }

        Ok(enums
            .into_iter()
            .map(|(name, values)| DbEnum { name, values })
            .collect())
    }

    async fn read_indexes(
        &self,
        pool: &AnyPool,
        schema: &str,
    ) -> Result<Vec<DbIndex>, sqlx::Error> {
        // 外部キー制約のために自動作成されたインデックスは除外
        let sql = r#"
            SELECT
                CAST(s.INDEX_NAME AS CHAR),
                CAST(s.TABLE_NAME AS CHAR),
                CAST(s.COLUMN_NAME AS CHAR),
                CAST(s.NON_UNIQUE AS SIGNED)
            FROM information_schema.STATISTICS s
            WHERE s.TABLE_SCHEMA = ?
                AND NOT EXISTS (
                    SELECT 1 FROM information_schema.TABLE_CONSTRAINTS tc
                    WHERE tc.TABLE_SCHEMA = s.TABLE_SCHEMA
                        AND tc.TABLE_NAME = s.TABLE_NAME
                        AND tc.CONSTRAINT_NAME = s.INDEX_NAME
                        AND tc.CONSTRAINT_TYPE = 'FOREIGN KEY'
                )
            ORDER BY s.TABLE_NAME, s.INDEX_NAME, s.SEQ_IN_INDEX
        "#;

        let rows = sqlx::query(sql).bind(schema).fetch_all(pool).await?;

        let mut indexes: Vec<DbIndex> = Vec::new();
        for row in &rows {
            let name: String = row.try_get(0)?;
            let table_name: String = row.try_get(1)?;
            // 関数インデックスはカラム名を持たない
            let Some(column) = row.try_get::<Option<String>, _>(2)? else {
                continue;
            };
            match indexes.last_mut() {
                Some(last) if last.name == name && last.table_name == table_name => {
                    last.columns.push(column)
                }
                _ => {
                    let non_unique: i64 = row.try_get(3)?;
                    indexes.push(DbIndex {
                        is_primary: name == "PRIMARY",
                        name,
                        table_name,
                        columns: vec![column],
                        is_unique: non_unique == 0,
                    })
                }
            }
        }

        Ok(indexes)
    }

    async fn read_constraints(
        &self,
        pool: &AnyPool,
        schema: &str,
    ) -> Result<Vec<DbConstraint>, sqlx::Error> {
        let sql = r#"
            SELECT
                CAST(tc.CONSTRAINT_NAME AS CHAR),
                CAST(tc.TABLE_NAME AS CHAR),
                CAST(tc.CONSTRAINT_TYPE AS CHAR),
                CAST(kcu.COLUMN_NAME AS CHAR),
                CAST(kcu.REFERENCED_TABLE_NAME AS CHAR),
                CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR),
                CAST(rc.DELETE_RULE AS CHAR),
                CAST(rc.UPDATE_RULE AS CHAR),
                CAST(cc.CHECK_CLAUSE AS CHAR)
            FROM information_schema.TABLE_CONSTRAINTS tc
            LEFT JOIN information_schema.KEY_COLUMN_USAGE kcu
                ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
                AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                AND kcu.TABLE_NAME = tc.TABLE_NAME
            LEFT JOIN information_schema.REFERENTIAL_CONSTRAINTS rc
                ON rc.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
                AND rc.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                AND rc.TABLE_NAME = tc.TABLE_NAME
            LEFT JOIN information_schema.CHECK_CONSTRAINTS cc
                ON tc.CONSTRAINT_TYPE = 'CHECK'
                AND cc.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
                AND cc.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
            WHERE tc.TABLE_SCHEMA = ?
            ORDER BY tc.TABLE_NAME, tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
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
}
