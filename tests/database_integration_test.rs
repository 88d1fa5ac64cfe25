/// データベース統合テスト
///
/// testcontainersを使用して実際のデータベースに対してスキーマの作成・読み取り・比較・削除を検証します。
///
/// 注意: このテストはDockerが必要です。通常のテスト実行ではスキップされます。

#[cfg(test)]
mod database_integration_tests {
    use ptah::adapters::database::DatabaseConnection;
    use ptah::core::package::PackageParseResult;
    use ptah::services::migration_generator::generate_migration_sql;
    use ptah::services::schema_comparator::compare_schemas;
    use ptah::{ConnectionConfig, Dialect};
    use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
    use testcontainers_modules::mysql::Mysql;
    use testcontainers_modules::postgres::Postgres;

    const PACKAGE: &str = r#"
    {
        "tables": [
            { "struct_name": "User", "name": "users", "comment": "registered users" },
            { "struct_name": "Post", "name": "posts" }
        ],
        "fields": [
            { "struct_name": "User", "name": "id", "type": "SERIAL", "primary": true },
            { "struct_name": "User", "name": "email", "type": "VARCHAR(255)", "unique": true },
            { "struct_name": "User", "name": "status", "type": "status_enum", "default": "active" },
            { "struct_name": "User", "name": "created_at", "type": "TIMESTAMP", "default_fn": "CURRENT_TIMESTAMP" },
            { "struct_name": "Post", "name": "id", "type": "SERIAL", "primary": true },
            {
                "struct_name": "Post", "name": "user_id", "type": "INTEGER",
                "foreign": "users(id)", "on_delete": "CASCADE"
            },
            { "struct_name": "Post", "name": "title", "type": "VARCHAR(200)" },
            { "struct_name": "Post", "name": "body", "type": "TEXT", "nullable": true }
        ],
        "indexes": [
            { "struct_name": "Post", "name": "idx_posts_user", "fields": ["user_id"] }
        ],
        "enums": [
            { "name": "status_enum", "values": ["active", "inactive"] }
        ]
    }
    "#;

    fn desired() -> PackageParseResult {
        PackageParseResult::from_json(PACKAGE).unwrap()
    }

    /// PostgreSQLコンテナを起動して接続
    async fn setup_postgres() -> Result<
        (ContainerAsync<Postgres>, DatabaseConnection),
        Box<dyn std::error::Error>,
    > {
        let container = Postgres::default().with_tag("16-alpine").start().await?;
        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let dsn = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

        let connection = DatabaseConnection::connect(&ConnectionConfig::from_dsn(dsn)?).await?;
        Ok((container, connection))
    }

    /// MySQLコンテナを起動して接続（スキーマ名はSELECT DATABASE()で解決）
    async fn setup_mysql(
    ) -> Result<(ContainerAsync<Mysql>, DatabaseConnection), Box<dyn std::error::Error>> {
        let container = Mysql::default().start().await?;
        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(3306).await?;
        let dsn = format!("mysql://root@{}:{}/test", host, port);

        let connection = DatabaseConnection::connect(&ConnectionConfig::from_dsn(dsn)?).await?;
        Ok((container, connection))
    }

    /// 作成したスキーマを読み戻すと差分がない
    async fn assert_round_trip(connection: &DatabaseConnection) {
        let desired = desired();
        let mut writer = connection.writer();

        assert!(writer.check_schema_exists(&desired).await.unwrap().is_empty());

        let report = writer.write_schema(&desired).await.unwrap();
        assert!(!report.statements.is_empty());
        assert!(!writer.in_transaction());

        assert_eq!(
            writer.check_schema_exists(&desired).await.unwrap(),
            vec!["posts", "users"]
        );

        let actual = connection.reader().read_schema().await.unwrap();
        let users = actual.table("users").unwrap();
        assert!(users.column("id").unwrap().is_primary_key);
        assert!(users.column("id").unwrap().is_auto_increment);
        assert!(users.column("email").unwrap().is_unique);
        assert_eq!(users.comment.as_deref(), Some("registered users"));

        let diff = compare_schemas(&desired, &actual);
        assert!(!diff.has_changes(), "unexpected diff: {:#?}", diff);
        assert!(generate_migration_sql(&diff, &desired, connection.dialect())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    #[ignore] // Docker必須
    async fn test_postgres_write_read_and_self_diff() {
        let (_container, connection) = setup_postgres().await.unwrap();
        assert_eq!(connection.schema_name(), "public");

        assert_round_trip(&connection).await;

        let actual = connection.reader().read_schema().await.unwrap();
        let status = actual.enum_type("status_enum").unwrap();
        assert_eq!(status.values, vec!["active", "inactive"]);
        assert!(actual.index("idx_posts_user").is_some());
        assert!(actual.index("users_email_key").is_none());
    }

    #[tokio::test]
    #[ignore] // Docker必須
    async fn test_mysql_write_read_and_self_diff() {
        let (_container, connection) = setup_mysql().await.unwrap();
        assert_eq!(connection.schema_name(), "test");

        assert_round_trip(&connection).await;

        let actual = connection.reader().read_schema().await.unwrap();
        assert_eq!(actual.enums.len(), 1);
        assert_eq!(actual.enums[0].name, "enum_active_inactive");
    }

    /// 失敗した文があれば全体がロールバックされる
    #[tokio::test]
    #[ignore] // Docker必須
    async fn test_failed_write_rolls_back_everything() {
        let (_container, connection) = setup_postgres().await.unwrap();
        let mut broken = desired();
        broken
            .fields
            .iter_mut()
            .find(|f| f.name == "title")
            .unwrap()
            .field_type = "NO_SUCH_TYPE".to_string();

        let mut writer = connection.writer();
        let error = writer.write_schema(&broken).await.unwrap_err();
        assert!(error.is_execution());
        assert!(error.failed_sql().unwrap().contains("CREATE TABLE posts"));
        assert!(!writer.in_transaction());

        // 先に作成されたENUMとusersも残らない
        let actual = connection.reader().read_schema().await.unwrap();
        assert!(actual.tables.is_empty());
        assert!(actual.enums.is_empty());
    }

    /// トランザクション状態機械
    #[tokio::test]
    #[ignore] // Docker必須
    async fn test_transaction_state_machine() {
        let (_container, connection) = setup_postgres().await.unwrap();
        let mut writer = connection.writer();

        writer.rollback_transaction().await.unwrap();
        writer.rollback_transaction().await.unwrap();
        assert!(writer
            .execute_sql("CREATE TABLE t (id INT)")
            .await
            .unwrap_err()
            .is_transaction_state());

        writer.begin_transaction().await.unwrap();
        assert!(writer.begin_transaction().await.unwrap_err().is_transaction_state());
        writer.execute_sql("CREATE TABLE t (id INT)").await.unwrap();
        writer.rollback_transaction().await.unwrap();

        writer.begin_transaction().await.unwrap();
        writer.execute_sql("CREATE TABLE kept (id INT)").await.unwrap();
        writer.commit_transaction().await.unwrap();
        assert!(writer.commit_transaction().await.unwrap_err().is_transaction_state());

        let actual = connection.reader().read_schema().await.unwrap();
        assert_eq!(actual.table_names(), vec!["kept"]);
    }

    /// 生成されたマイグレーションの警告コメントは実行されない
    #[tokio::test]
    #[ignore] // Docker必須
    async fn test_destructive_changes_are_not_executed() {
        let (_container, connection) = setup_postgres().await.unwrap();
        let mut writer = connection.writer();
        writer.write_schema(&desired()).await.unwrap();

        writer.begin_transaction().await.unwrap();
        writer
            .execute_sql("CREATE TABLE old_table (id INT)")
            .await
            .unwrap();
        writer.commit_transaction().await.unwrap();

        let desired = desired();
        let actual = connection.reader().read_schema().await.unwrap();
        let diff = compare_schemas(&desired, &actual);
        assert_eq!(diff.tables_removed, vec!["old_table"]);

        let statements = generate_migration_sql(&diff, &desired, Dialect::PostgreSQL).unwrap();
        writer.begin_transaction().await.unwrap();
        let executed = writer.execute_statements(&statements).await.unwrap();
        writer.commit_transaction().await.unwrap();
        assert_eq!(executed, 0);

        let actual = connection.reader().read_schema().await.unwrap();
        assert!(actual.table("old_table").is_some());
    }

    /// 追加カラムのマイグレーションを適用すると差分が解消される
    #[tokio::test]
    #[ignore] // Docker必須
    async fn test_additive_migration_converges() {
        let (_container, connection) = setup_postgres().await.unwrap();
        let mut writer = connection.writer();
        writer.write_schema(&desired()).await.unwrap();

        let mut desired = desired();
        let mut nickname = desired.fields[2].clone();
        nickname.name = "nickname".to_string();
        nickname.field_type = "VARCHAR(64)".to_string();
        nickname.default = None;
        nickname.nullable = true;
        desired.fields.push(nickname);

        let actual = connection.reader().read_schema().await.unwrap();
        let diff = compare_schemas(&desired, &actual);
        assert_eq!(diff.tables_modified.len(), 1);
        assert_eq!(diff.tables_modified[0].columns_added, vec!["nickname"]);

        let statements = generate_migration_sql(&diff, &desired, Dialect::PostgreSQL).unwrap();
        writer.begin_transaction().await.unwrap();
        writer.execute_statements(&statements).await.unwrap();
        writer.commit_transaction().await.unwrap();

        let actual = connection.reader().read_schema().await.unwrap();
        assert!(!compare_schemas(&desired, &actual).has_changes());
    }

    #[tokio::test]
    #[ignore] // Docker必須
    async fn test_drop_all_tables_on_postgres() {
        let (_container, connection) = setup_postgres().await.unwrap();
        let mut writer = connection.writer();
        writer.write_schema(&desired()).await.unwrap();

        let report = writer.drop_all_tables().await.unwrap();
        let tables: Vec<&String> = report
            .statements
            .iter()
            .filter(|s| s.starts_with("DROP TABLE"))
            .collect();
        // 参照元のpostsが先に削除される
        assert!(tables[0].contains("\"posts\""));
        assert!(tables[1].contains("\"users\""));

        let actual = connection.reader().read_schema().await.unwrap();
        assert!(actual.tables.is_empty());
        assert!(actual.enums.is_empty());
    }

    #[tokio::test]
    #[ignore] // Docker必須
    async fn test_drop_schema_on_mysql() {
        let (_container, connection) = setup_mysql().await.unwrap();
        let mut writer = connection.writer();
        let desired = desired();
        writer.write_schema(&desired).await.unwrap();

        let report = writer.drop_schema(&desired).await.unwrap();
        assert_eq!(report.statements.len(), 2);
        assert!(!writer.in_transaction());

        assert!(writer.check_schema_exists(&desired).await.unwrap().is_empty());
    }
}
