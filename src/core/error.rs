// エラー型定義
//
// マイグレーションエンジン全体で使用されるエラー型を提供します。
// thiserrorを使用して、PtahError と RenderError を定義します。

use crate::core::config::Dialect;
use thiserror::Error;

/// イントロスペクションのフェーズ
///
/// カタログ読み込みのどの段階で失敗したかを表します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrospectionPhase {
    Tables,
    Columns,
    Enums,
    Indexes,
    Constraints,
}

impl std::fmt::Display for IntrospectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IntrospectionPhase::Tables => "tables",
            IntrospectionPhase::Columns => "columns",
            IntrospectionPhase::Enums => "enums",
            IntrospectionPhase::Indexes => "indexes",
            IntrospectionPhase::Constraints => "constraints",
        };
        write!(f, "{}", name)
    }
}

/// レンダリングエラー
///
/// 方言がサポートしないASTノードを描画しようとした場合に発生します。
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot render {statement} for {dialect}: {message}")]
pub struct RenderError {
    /// 対象の文（例: "CREATE TYPE status_enum"）
    pub statement: String,
    /// 方言
    pub dialect: Dialect,
    /// エラーメッセージ
    pub message: String,
}

impl RenderError {
    /// 新しいレンダリングエラーを作成
    pub fn new(
        statement: impl Into<String>,
        dialect: Dialect,
        message: impl Into<String>,
    ) -> Self {
        Self {
            statement: statement.into(),
            dialect,
            message: message.into(),
        }
    }
}

/// エンジンのエラー
#[derive(Debug, Error)]
pub enum PtahError {
    /// 入力スキーマの解析エラー
    #[error("Parse error: {message}")]
    Parse {
        /// エラーメッセージ
        message: String,
    },

    /// 設定エラー
    #[error("Configuration error: {message}")]
    Configuration {
        /// エラーメッセージ
        message: String,
    },

    /// 接続エラー
    #[error("Database connection error: {message} (cause: {cause})")]
    Connection {
        /// エラーメッセージ
        message: String,
        /// エラー原因
        cause: String,
    },

    /// カタログ読み込みエラー
    #[error("Introspection error while reading {phase}: {message}")]
    Introspection {
        /// 失敗したフェーズ
        phase: IntrospectionPhase,
        /// エラーメッセージ
        message: String,
    },

    /// レンダリングエラー
    #[error(transparent)]
    Render(#[from] RenderError),

    /// トランザクション状態エラー
    #[error("Transaction state error: {message}")]
    TransactionState {
        /// エラーメッセージ
        message: String,
    },

    /// SQL実行エラー
    #[error("Failed to execute statement: {sql} (cause: {cause})")]
    Execution {
        /// 失敗したSQL
        sql: String,
        /// エラー原因
        cause: String,
    },
}

impl PtahError {
    /// イントロスペクションエラーを作成
    pub fn introspection(phase: IntrospectionPhase, cause: impl std::fmt::Display) -> Self {
        PtahError::Introspection {
            phase,
            message: cause.to_string(),
        }
    }

    /// トランザクション状態エラーを作成
    pub fn transaction_state(message: impl Into<String>) -> Self {
        PtahError::TransactionState {
            message: message.into(),
        }
    }

    /// 実行エラーを作成
    pub fn execution(sql: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        PtahError::Execution {
            sql: sql.into(),
            cause: cause.to_string(),
        }
    }

    /// 解析エラーかどうか
    pub fn is_parse(&self) -> bool {
        matches!(self, PtahError::Parse { .. })
    }

    /// 接続エラーかどうか
    pub fn is_connection(&self) -> bool {
        matches!(self, PtahError::Connection { .. })
    }

    /// イントロスペクションエラーかどうか
    pub fn is_introspection(&self) -> bool {
        matches!(self, PtahError::Introspection { .. })
    }

    /// レンダリングエラーかどうか
    pub fn is_render(&self) -> bool {
        matches!(self, PtahError::Render(_))
    }

    /// トランザクション状態エラーかどうか
    pub fn is_transaction_state(&self) -> bool {
        matches!(self, PtahError::TransactionState { .. })
    }

    /// 実行エラーかどうか
    pub fn is_execution(&self) -> bool {
        matches!(self, PtahError::Execution { .. })
    }

    /// 失敗したイントロスペクションのフェーズ
    pub fn phase(&self) -> Option<IntrospectionPhase> {
        match self {
            PtahError::Introspection { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// 失敗したSQL文
    pub fn failed_sql(&self) -> Option<&str> {
        match self {
            PtahError::Execution { sql, .. } => Some(sql),
            _ => None,
        }
    }
}
