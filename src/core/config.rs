// 接続設定管理
//
// データベース方言と接続設定（DSN・スキーマ名・プール設定）を扱います。
// YAML形式の設定ファイルからの読み込みにも対応します。

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// データベース方言
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    #[serde(rename = "postgres", alias = "postgresql")]
    PostgreSQL,
    #[serde(rename = "mysql")]
    MySQL,
    #[serde(rename = "mariadb")]
    MariaDB,
}

impl Dialect {
    /// 方言名（オーバーライドのキーとしても使用）
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::PostgreSQL => "postgres",
            Dialect::MySQL => "mysql",
            Dialect::MariaDB => "mariadb",
        }
    }

    /// 独立したENUM型（CREATE TYPE）を持つかどうか
    pub fn has_native_enums(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    /// MySQL系（MySQL / MariaDB）かどうか
    pub fn is_mysql_family(&self) -> bool {
        matches!(self, Dialect::MySQL | Dialect::MariaDB)
    }

    /// デフォルトのポート番号
    pub fn default_port(&self) -> u16 {
        match self {
            Dialect::PostgreSQL => 5432,
            Dialect::MySQL | Dialect::MariaDB => 3306,
        }
    }

    /// 接続URLのスキームから方言を推定
    pub fn from_dsn(dsn: &str) -> Option<Self> {
        let scheme = dsn.split("://").next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Some(Dialect::PostgreSQL),
            "mysql" => Some(Dialect::MySQL),
            "mariadb" => Some(Dialect::MariaDB),
            _ => None,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dialect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::PostgreSQL),
            "mysql" => Ok(Dialect::MySQL),
            "mariadb" => Ok(Dialect::MariaDB),
            other => Err(anyhow!(
                "Unsupported dialect '{}'. Supported dialects: postgres, mysql, mariadb",
                other
            )),
        }
    }
}

/// データベース接続設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// データベース方言
    pub dialect: Dialect,

    /// 接続文字列
    pub dsn: String,

    /// 対象スキーマ名（PostgreSQLのスキーマ / MySQLのデータベース名）
    #[serde(default)]
    pub schema: Option<String>,

    /// 最大接続数
    #[serde(default)]
    pub max_connections: Option<u32>,

    /// 接続タイムアウト（秒）
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl ConnectionConfig {
    /// デフォルトの最大接続数
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

    /// デフォルトの接続タイムアウト（秒）
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// 方言とDSNから設定を作成
    pub fn new(dialect: Dialect, dsn: impl Into<String>) -> Self {
        Self {
            dialect,
            dsn: dsn.into(),
            schema: None,
            max_connections: None,
            timeout: None,
        }
    }

    /// DSNのスキームから方言を推定して設定を作成
    pub fn from_dsn(dsn: impl Into<String>) -> Result<Self> {
        let dsn = dsn.into();
        let dialect = Dialect::from_dsn(&dsn)
            .ok_or_else(|| anyhow!("Cannot infer dialect from connection string scheme"))?;
        Ok(Self::new(dialect, dsn))
    }

    /// スキーマ名を指定
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// 解決済みのスキーマ名
    ///
    /// 明示指定がなければPostgreSQLは`public`、MySQL系は`None`
    /// （接続時に現在のデータベースを使用）を返します。
    pub fn resolved_schema(&self) -> Option<String> {
        match (&self.schema, self.dialect) {
            (Some(schema), _) if !schema.is_empty() => Some(schema.clone()),
            (_, Dialect::PostgreSQL) => Some("public".to_string()),
            _ => None,
        }
    }

    /// ドライバーに渡す接続文字列
    ///
    /// sqlxは`mariadb://`スキームを認識しないため`mysql://`に置き換えます。
    pub fn driver_url(&self) -> String {
        match self.dsn.split_once("://") {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("mariadb") => {
                format!("mysql://{}", rest)
            }
            _ => self.dsn.clone(),
        }
    }

    /// 最大接続数（未設定時はデフォルト値）
    pub fn resolved_max_connections(&self) -> u32 {
        self.max_connections
            .unwrap_or(Self::DEFAULT_MAX_CONNECTIONS)
    }

    /// タイムアウト秒数（未設定時はデフォルト値）
    pub fn resolved_timeout(&self) -> u64 {
        self.timeout.unwrap_or(Self::DEFAULT_TIMEOUT_SECS)
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> Result<()> {
        if self.dsn.trim().is_empty() {
            return Err(anyhow!("Connection string is not specified"));
        }

        if let Some(inferred) = Dialect::from_dsn(&self.dsn) {
            let compatible = inferred == self.dialect
                || (inferred.is_mysql_family() && self.dialect.is_mysql_family());
            if !compatible {
                return Err(anyhow!(
                    "Connection string scheme '{}' does not match dialect '{}'",
                    inferred,
                    self.dialect
                ));
            }
        }

        if self.max_connections == Some(0) {
            return Err(anyhow!("max_connections must be greater than 0"));
        }

        Ok(())
    }

    /// YAMLファイルから設定を読み込む
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = content.parse()?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }
}

/// std::str::FromStrトレイトの実装
impl FromStr for ConnectionConfig {
    type Err = anyhow::Error;

    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        serde_saphyr::from_str(yaml).with_context(|| "Failed to parse connection config")
    }
}
