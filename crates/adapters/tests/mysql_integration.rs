use pantry_adapters::mysql::MysqlBackend;
use pantry_core::config::{ConnectionConfig, ConnectionTarget};
use pantry_core::connection_manager::{ConnectionBackend, ConnectionProvider};
use pantry_core::data_source::{AllowList, RowCap};
use pantry_core::query_runner::{FetchError, QueryBackend, QueryExecutor};
use pantry_core::statement_guard::PlaygroundPolicy;
use pantry_core::tabular::CellValue;

fn mysql_integration_enabled() -> bool {
    matches!(
        std::env::var("PANTRY_RUN_MYSQL_INTEGRATION").ok().as_deref(),
        Some("1")
    )
}

fn integration_config(database: &str) -> ConnectionConfig {
    let host = std::env::var("PANTRY_TEST_DB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let user = std::env::var("PANTRY_TEST_DB_USER").unwrap_or_else(|_| "root".to_string());
    let password = std::env::var("PANTRY_TEST_DB_PASSWORD").unwrap_or_default();
    let port = std::env::var("PANTRY_TEST_DB_PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(3306);

    let credentials = if password.is_empty() {
        user
    } else {
        format!("{user}:{password}")
    };
    ConnectionConfig {
        name: "adapters-integration".to_string(),
        target: ConnectionTarget::ConnectionString {
            url: format!("mysql://{credentials}@{host}:{port}/{database}"),
        },
    }
}

async fn execute_sql(config: &ConnectionConfig, sql: &str) {
    let backend = MysqlBackend;
    let mut connection = backend.connect(config).await.expect("connect should succeed");
    backend
        .run_query(&mut connection, sql)
        .await
        .expect("statement should run");
    backend
        .disconnect(connection)
        .await
        .expect("disconnect should succeed");
}

#[tokio::test(flavor = "current_thread")]
async fn mysql_backend_browses_views_and_reports_failures() {
    if !mysql_integration_enabled() {
        return;
    }

    let database = "pantry_adapters_cov";
    execute_sql(
        &integration_config("mysql"),
        &format!("CREATE DATABASE IF NOT EXISTS `{database}`"),
    )
    .await;

    let config = integration_config(database);
    execute_sql(&config, "DROP VIEW IF EXISTS Food_Claims").await;
    execute_sql(&config, "DROP TABLE IF EXISTS CLAIMS").await;
    execute_sql(
        &config,
        "CREATE TABLE CLAIMS (\
         Claim_ID BIGINT NOT NULL PRIMARY KEY,\
         Status VARCHAR(16) NOT NULL,\
         Quantity INT NULL,\
         Timestamp DATE NULL\
         )",
    )
    .await;
    execute_sql(
        &config,
        "INSERT INTO CLAIMS VALUES \
         (1, 'Completed', 3, '2024-03-01'), (2, 'Pending', NULL, NULL)",
    )
    .await;
    execute_sql(
        &config,
        "CREATE VIEW Food_Claims AS SELECT Claim_ID, Status, Quantity FROM CLAIMS",
    )
    .await;

    let executor = QueryExecutor::new(
        ConnectionProvider::new(MysqlBackend, config.clone()),
        PlaygroundPolicy::ReadOnly,
    );
    executor.provider().probe().await.expect("probe should succeed");

    let allow_list = AllowList::new(vec!["CLAIMS".to_string()], vec!["Food_Claims".to_string()]);
    let claims = executor
        .fetch(&allow_list.table("CLAIMS").expect("allowed"), RowCap::Limit(50))
        .await
        .expect("browse should succeed");
    assert_eq!(claims.row_count(), 2);
    assert_eq!(claims.rows()[0][0], CellValue::Integer(1));
    assert_eq!(claims.rows()[0][3], CellValue::Date("2024-03-01".to_string()));
    assert_eq!(claims.rows()[1][2], CellValue::Null);

    let view = executor
        .fetch(&allow_list.view("Food_Claims").expect("allowed"), RowCap::Unlimited)
        .await
        .expect("view should succeed");
    assert_eq!(view.columns(), ["Claim_ID", "Status", "Quantity"]);

    let err = executor
        .fetch_sql("SELECT Foo FROM CLAIMS")
        .await
        .expect_err("unknown column should fail");
    assert!(matches!(err, FetchError::Query(_)));

    execute_sql(&config, "DROP VIEW IF EXISTS Food_Claims").await;
    execute_sql(&config, "DROP TABLE IF EXISTS CLAIMS").await;
}

#[tokio::test(flavor = "current_thread")]
async fn unreachable_server_is_a_connection_error() {
    if !mysql_integration_enabled() {
        return;
    }

    let config = ConnectionConfig {
        name: "unreachable".to_string(),
        target: ConnectionTarget::ConnectionString {
            url: "mysql://nobody@127.0.0.1:1/none".to_string(),
        },
    };
    let executor = QueryExecutor::new(
        ConnectionProvider::new(MysqlBackend, config),
        PlaygroundPolicy::Unrestricted,
    );

    let err = executor
        .fetch_sql("SELECT 1")
        .await
        .expect_err("nothing listens on port 1");
    assert!(matches!(err, FetchError::Connection(_)));
    assert!(err.to_string().starts_with("Database connection failed: "));
}
