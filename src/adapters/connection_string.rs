// 接続文字列ビルダー
//
// ホスト・ポート・データベース名・認証情報から接続文字列を生成する。

use crate::core::config::{ConnectionConfig, Dialect};
use serde::{Deserialize, Serialize};
use urlencoding::encode;

/// 個別指定の接続設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub database: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl DatabaseSettings {
    /// ポート番号を解決（未指定時は方言のデフォルト）
    pub fn resolved_port(&self, dialect: Dialect) -> u16 {
        self.port.unwrap_or_else(|| dialect.default_port())
    }

    /// 接続設定に変換
    pub fn to_connection_config(&self, dialect: Dialect) -> ConnectionConfig {
        ConnectionConfig::new(dialect, build_connection_string(dialect, self))
    }
}

/// 接続文字列を生成
///
/// ユーザー名とパスワードはパーセントエンコードされます。
/// これにより、`@`, `:`, `/`, `#`, `?` などの特殊文字を含むパスワードでも
/// 正しく接続文字列が構築されます。
pub fn build_connection_string(dialect: Dialect, settings: &DatabaseSettings) -> String {
    let (scheme, default_user) = match dialect {
        Dialect::PostgreSQL => ("postgres", "postgres"),
        Dialect::MySQL => ("mysql", "root"),
        Dialect::MariaDB => ("mariadb", "root"),
    };

    let user = settings.user.as_deref().unwrap_or(default_user);
    let encoded_user = encode(user);
    let auth = match settings.password.as_deref() {
        Some(password) if !password.is_empty() => {
            format!("{}:{}", encoded_user, encode(password))
        }
        _ => encoded_user.to_string(),
    };

    format!(
        "{}://{}@{}:{}/{}",
        scheme,
        auth,
        settings.host,
        settings.resolved_port(dialect),
        settings.database
    )
}
