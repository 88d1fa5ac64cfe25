// スキーマライター
//
// DDLをトランザクション内で実行します。状態は Idle（トランザクションなし）と
// TxOpen（トランザクション実行中）の2つで、ライターごとに同時に開けるのは1つだけです。
// 失敗時は必ずロールバックし、途中まで適用されたスキーマを残しません。

use crate::adapters::schema_reader::{create_introspector, SchemaReader};
use crate::adapters::sql_quote::{is_comment_only, quote_identifier, split_sql_statements};
use crate::core::config::Dialect;
use crate::core::error::{IntrospectionPhase, PtahError};
use crate::core::package::PackageParseResult;
use crate::services::dependency_order::drop_order;
use crate::services::schema_conversion::{build_schema_nodes, renderer_for, table_dependencies};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Any, AnyPool, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// 適用結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
    /// 実行した文（実行順）
    pub statements: Vec<String>,
    /// 開始時刻
    pub started_at: DateTime<Utc>,
    /// 所要時間（ミリ秒）
    pub duration_ms: i64,
}

impl ApplyReport {
    fn finish(statements: Vec<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            statements,
            started_at,
            duration_ms: (Utc::now() - started_at).num_milliseconds(),
        }
    }
}

/// スキーマライター
///
/// 複数のタスクから共有する場合は呼び出し側で排他制御してください。
pub struct SchemaWriter {
    pool: AnyPool,
    dialect: Dialect,
    schema_name: String,
    tx: Option<Transaction<'static, Any>>,
}

impl std::fmt::Debug for SchemaWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaWriter")
            .field("dialect", &self.dialect)
            .field("schema_name", &self.schema_name)
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

impl SchemaWriter {
    pub fn new(pool: AnyPool, dialect: Dialect, schema_name: impl Into<String>) -> Self {
        Self {
            pool,
            dialect,
            schema_name: schema_name.into(),
            tx: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// トランザクション実行中かどうか
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// トランザクションを開始（Idle → TxOpen）
    pub async fn begin_transaction(&mut self) -> Result<(), PtahError> {
        if self.tx.is_some() {
            return Err(PtahError::transaction_state("transaction already in progress"));
        }

        let tx = self.pool.begin().await.map_err(|e| PtahError::Connection {
            message: "Failed to start transaction".to_string(),
            cause: e.to_string(),
        })?;
        self.tx = Some(tx);
        info!(dialect = %self.dialect, "Transaction started");
        Ok(())
    }

    /// 実行中のトランザクションで1文を実行
    pub async fn execute_sql(&mut self, sql: &str) -> Result<(), PtahError> {
        let Some(tx) = self.tx.as_mut() else {
            return Err(PtahError::transaction_state("no active transaction"));
        };

        debug!(sql, "Executing statement");
        sqlx::query(sql)
            .execute(&mut **tx)
            .await
            .map(|_| ())
            .map_err(|e| PtahError::execution(sql, e))
    }

    /// コミット（TxOpen → Idle）
    pub async fn commit_transaction(&mut self) -> Result<(), PtahError> {
        let Some(tx) = self.tx.take() else {
            return Err(PtahError::transaction_state("no active transaction to commit"));
        };

        tx.commit()
            .await
            .map_err(|e| PtahError::execution("COMMIT", e))?;
        info!(dialect = %self.dialect, "Transaction committed");
        Ok(())
    }

    /// ロールバック（TxOpen → Idle）
    ///
    /// トランザクションがない場合は何もしません。
    pub async fn rollback_transaction(&mut self) -> Result<(), PtahError> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };

        tx.rollback()
            .await
            .map_err(|e| PtahError::execution("ROLLBACK", e))?;
        info!(dialect = %self.dialect, "Transaction rolled back");
        Ok(())
    }

    /// 実行中のトランザクションで文の列を実行
    ///
    /// 各要素は文単位に分割され、コメントのみの要素（警告コメント等）は実行しません。
    /// 実行した文の数を返します。
    pub async fn execute_statements(&mut self, statements: &[String]) -> Result<usize, PtahError> {
        let mut executed = 0;
        for statement in statements {
            if is_comment_only(statement) {
                debug!(statement = %statement, "Skipping comment");
                continue;
            }
            for sql in split_sql_statements(statement) {
                self.execute_sql(&sql).await?;
                executed += 1;
            }
        }
        Ok(executed)
    }

    /// 望ましいスキーマを1つのトランザクションで作成
    ///
    /// ENUM、依存順のテーブル、インデックスの順に作成します。
    /// いずれかの文が失敗した場合はすべてロールバックします。
    pub async fn write_schema(
        &mut self,
        desired: &PackageParseResult,
    ) -> Result<ApplyReport, PtahError> {
        let nodes = build_schema_nodes(desired, self.dialect);
        let sql = renderer_for(desired, self.dialect).render_schema(&nodes)?;
        let statements = split_sql_statements(&sql);

        let report = self.apply_in_transaction(statements).await?;
        info!(
            tables = desired.tables.len(),
            statements = report.statements.len(),
            "Schema written"
        );
        Ok(report)
    }

    /// 望ましいスキーマのうち既に存在するテーブル名（ソート済み）
    ///
    /// 読み取りのみでトランザクションは使用しません。
    pub async fn check_schema_exists(
        &self,
        desired: &PackageParseResult,
    ) -> Result<Vec<String>, PtahError> {
        let existing: BTreeSet<String> = create_introspector(self.dialect)
            .read_tables(&self.pool, &self.schema_name)
            .await
            .map_err(|e| PtahError::introspection(IntrospectionPhase::Tables, e))?
            .into_iter()
            .map(|t| t.name)
            .collect();

        let found: BTreeSet<String> = desired
            .tables
            .iter()
            .filter(|t| existing.contains(&t.name))
            .map(|t| t.name.clone())
            .collect();
        Ok(found.into_iter().collect())
    }

    /// 稼働中のカタログにあるテーブル・ENUM・シーケンスをすべて削除
    ///
    /// テーブルは外部キー依存の逆順に削除します。
    pub async fn drop_all_tables(&mut self) -> Result<ApplyReport, PtahError> {
        let actual = SchemaReader::new(self.pool.clone(), self.dialect, self.schema_name.clone())
            .read_schema()
            .await?;

        let mut dependencies: BTreeMap<String, BTreeSet<String>> = actual
            .tables
            .iter()
            .map(|t| (t.name.clone(), BTreeSet::new()))
            .collect();
        for constraint in actual.constraints.iter().filter(|c| c.is_foreign_key()) {
            if let (Some(deps), Some(foreign)) = (
                dependencies.get_mut(&constraint.table_name),
                constraint.foreign_table.as_ref(),
            ) {
                deps.insert(foreign.clone());
            }
        }

        let mut statements: Vec<String> = drop_order(&dependencies)
            .iter()
            .map(|table| self.drop_statement("TABLE", table))
            .collect();

        if self.dialect.has_native_enums() {
            statements.extend(actual.enums.iter().map(|e| self.drop_statement("TYPE", &e.name)));

            // テーブル所有のシーケンスはCASCADEで消えるため、残りはIF EXISTSで吸収される
            let sequences = create_introspector(self.dialect)
                .read_sequences(&self.pool, &self.schema_name)
                .await
                .map_err(|e| PtahError::introspection(IntrospectionPhase::Tables, e))?;
            statements.extend(sequences.iter().map(|s| self.drop_statement("SEQUENCE", s)));
        }

        self.drop_in_transaction(statements).await
    }

    /// 望ましいスキーマに含まれるテーブル・ENUMを削除
    pub async fn drop_schema(
        &mut self,
        desired: &PackageParseResult,
    ) -> Result<ApplyReport, PtahError> {
        let mut statements: Vec<String> = drop_order(&table_dependencies(desired))
            .iter()
            .map(|table| self.drop_statement("TABLE", table))
            .collect();

        if self.dialect.has_native_enums() {
            statements.extend(desired.enums.iter().map(|e| self.drop_statement("TYPE", &e.name)));
        }

        self.drop_in_transaction(statements).await
    }

    /// `DROP <kind> IF EXISTS <schema>.<name> CASCADE`
    fn drop_statement(&self, kind: &str, name: &str) -> String {
        format!(
            "DROP {} IF EXISTS {}.{} CASCADE",
            kind,
            quote_identifier(self.dialect, &self.schema_name),
            quote_identifier(self.dialect, name)
        )
    }

    async fn apply_in_transaction(
        &mut self,
        statements: Vec<String>,
    ) -> Result<ApplyReport, PtahError> {
        let started_at = Utc::now();
        run_in_transaction(self, &statements).await?;
        Ok(ApplyReport::finish(statements, started_at))
    }

    async fn drop_in_transaction(
        &mut self,
        statements: Vec<String>,
    ) -> Result<ApplyReport, PtahError> {
        let started_at = Utc::now();
        if self.dialect.is_mysql_family() {
            run_without_foreign_key_checks(self, &statements).await?;
        } else {
            run_in_transaction(self, &statements).await?;
        }
        info!(statements = statements.len(), "Schema dropped");
        Ok(ApplyReport::finish(statements, started_at))
    }
}

/// トランザクション境界と文の実行
#[async_trait]
trait TransactionalExecutor: Send {
    async fn begin(&mut self) -> Result<(), PtahError>;
    async fn execute(&mut self, sql: &str) -> Result<(), PtahError>;
    async fn commit(&mut self) -> Result<(), PtahError>;
    async fn rollback(&mut self) -> Result<(), PtahError>;
}

#[async_trait]
impl TransactionalExecutor for SchemaWriter {
    async fn begin(&mut self) -> Result<(), PtahError> {
        self.begin_transaction().await
    }

    async fn execute(&mut self, sql: &str) -> Result<(), PtahError> {
        self.execute_sql(sql).await
    }

    async fn commit(&mut self) -> Result<(), PtahError> {
        self.commit_transaction().await
    }

    async fn rollback(&mut self) -> Result<(), PtahError> {
        self.rollback_transaction().await
    }
}

// 全文を1つのトランザクションで実行し、失敗したらロールバック
async fn run_in_transaction<E: TransactionalExecutor>(
    executor: &mut E,
    statements: &[String],
) -> Result<(), PtahError> {
    executor.begin().await?;

    for sql in statements {
        if let Err(e) = executor.execute(sql).await {
            return Err(abort(executor, e).await);
        }
    }

    if let Err(e) = executor.commit().await {
        return Err(abort(executor, e).await);
    }
    Ok(())
}

// MySQL系は外部キー検査を無効化してから実行し、結果にかかわらず元に戻す
async fn run_without_foreign_key_checks<E: TransactionalExecutor>(
    executor: &mut E,
    statements: &[String],
) -> Result<(), PtahError> {
    executor.begin().await?;
    if let Err(e) = executor.execute("SET FOREIGN_KEY_CHECKS = 0").await {
        return Err(abort(executor, e).await);
    }

    let mut outcome = Ok(());
    for sql in statements {
        outcome = executor.execute(sql).await;
        if outcome.is_err() {
            break;
        }
    }

    let restored = executor.execute("SET FOREIGN_KEY_CHECKS = 1").await;
    let outcome = match (outcome, restored) {
        (Err(e), restored) => {
            if let Err(restore_error) = restored {
                warn!(error = %restore_error, "Failed to restore foreign key checks");
            }
            Err(e)
        }
        (Ok(()), restored) => restored,
    };

    if let Err(e) = outcome {
        return Err(abort(executor, e).await);
    }
    if let Err(e) = executor.commit().await {
        return Err(abort(executor, e).await);
    }
    Ok(())
}

// ロールバックして元のエラーを返す
async fn abort<E: TransactionalExecutor>(executor: &mut E, error: PtahError) -> PtahError {
    if let Err(rollback_error) = executor.rollback().await {
        warn!(error = %rollback_error, "Rollback failed");
    }
    error
}
