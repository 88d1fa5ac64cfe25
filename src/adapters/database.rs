// データベース接続アダプター
//
// SQLxのAnyドライバーで接続プールを作成し、方言と対象スキーマ名を保持します。
// 同じ接続からスキーマリーダーとスキーマライターを取り出せます。

use crate::adapters::schema_reader::SchemaReader;
use crate::adapters::schema_writer::SchemaWriter;
use crate::core::config::{ConnectionConfig, Dialect};
use crate::core::error::PtahError;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use std::time::Duration;
use tracing::{debug, info};

/// データベース接続
///
/// 接続プール・方言・解決済みスキーマ名の組です。
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: AnyPool,
    dialect: Dialect,
    schema_name: String,
}

impl DatabaseConnection {
    /// 設定に従って接続する
    ///
    /// MySQL系でスキーマ名が指定されていない場合は `SELECT DATABASE()` で
    /// 現在のデータベース名を取得します。
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, PtahError> {
        config.validate().map_err(|e| PtahError::Configuration {
            message: format!("{:#}", e),
        })?;

        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(config.resolved_max_connections())
            .acquire_timeout(Duration::from_secs(config.resolved_timeout()))
            .connect(&config.driver_url())
            .await
            .map_err(|e| PtahError::Connection {
                message: format!("Failed to connect to {} database", config.dialect),
                cause: e.to_string(),
            })?;

        let schema_name = match config.resolved_schema() {
            Some(schema) => schema,
            None => current_database(&pool).await?,
        };

        info!(dialect = %config.dialect, schema = %schema_name, "Connected to database");

        Ok(Self {
            pool,
            dialect: config.dialect,
            schema_name,
        })
    }

    /// 既存のプールから接続を作成
    pub fn from_pool(pool: AnyPool, dialect: Dialect, schema_name: impl Into<String>) -> Self {
        Self {
            pool,
            dialect,
            schema_name: schema_name.into(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// 対象スキーマ名（PostgreSQLのスキーマ、MySQLのデータベース）
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// スキーマリーダーを作成
    pub fn reader(&self) -> SchemaReader {
        SchemaReader::new(self.pool.clone(), self.dialect, self.schema_name.clone())
    }

    /// スキーマライターを作成
    ///
    /// ライターごとに独立したトランザクション状態を持ちます。
    pub fn writer(&self) -> SchemaWriter {
        SchemaWriter::new(self.pool.clone(), self.dialect, self.schema_name.clone())
    }

    /// 接続テストを実行
    pub async fn ping(&self) -> Result<(), PtahError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| PtahError::Connection {
                message: "Connection test failed".to_string(),
                cause: e.to_string(),
            })
    }

    /// 接続プールを閉じる
    pub async fn close(self) {
        debug!(schema = %self.schema_name, "Closing connection pool");
        self.pool.close().await;
    }
}

async fn current_database(pool: &AnyPool) -> Result<String, PtahError> {
    let row = sqlx::query("SELECT DATABASE()")
        .fetch_one(pool)
        .await
        .map_err(|e| PtahError::Connection {
            message: "Failed to resolve current database".to_string(),
            cause: e.to_string(),
        })?;

    let name: Option<String> = row.try_get(0).map_err(|e| PtahError::Connection {
        message: "Failed to resolve current database".to_string(),
        cause: e.to_string(),
    })?;

    name.filter(|n| !n.is_empty())
        .ok_or_else(|| PtahError::Configuration {
            message: "No database selected; specify one in the connection string".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let config = ConnectionConfig::new(Dialect::PostgreSQL, "");
        let err = DatabaseConnection::connect(&config).await.unwrap_err();
        assert!(matches!(err, PtahError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_connect_reports_unreachable_database() {
        let mut config =
            ConnectionConfig::new(Dialect::PostgreSQL, "postgres://postgres@127.0.0.1:1/none");
        config.timeout = Some(1);
        let err = DatabaseConnection::connect(&config).await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_from_pool_keeps_dialect_and_schema() {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .connect_lazy("mysql://root@127.0.0.1:1/app")
            .unwrap();
        let connection = DatabaseConnection::from_pool(pool, Dialect::MariaDB, "app");
        assert_eq!(connection.dialect(), Dialect::MariaDB);
        assert_eq!(connection.schema_name(), "app");
        assert_eq!(connection.reader().schema_name(), "app");
    }
}
