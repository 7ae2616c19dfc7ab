use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pantry_core::config::{ConnectionConfig, ConnectionTarget};
use pantry_core::connection_manager::{BackendError, ConnectionBackend};
use pantry_core::query_runner::{QueryBackend, QueryBackendError};
use pantry_core::tabular::{CellValue, TabularResult};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

/// Embedded database files. rusqlite is synchronous, so every call runs on
/// the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackend;

#[derive(Debug, Clone)]
pub struct SqliteConnection {
    inner: Arc<Mutex<Connection>>,
}

impl SqliteConnection {
    async fn with<T, F>(&self, task: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, String> + Send + 'static,
    {
        let shared = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let guard = shared
                .lock()
                .map_err(|_| "sqlite connection lock poisoned".to_string())?;
            task(&guard)
        })
        .await
        .map_err(|error| error.to_string())?
    }
}

#[async_trait]
impl ConnectionBackend for SqliteBackend {
    type Connection = SqliteConnection;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection, BackendError> {
        let path = database_path(config)?;
        let connection = tokio::task::spawn_blocking(move || open(&path))
            .await
            .map_err(|error| BackendError::new(error.to_string()))?
            .map_err(to_connection_error)?;
        Ok(SqliteConnection {
            inner: Arc::new(Mutex::new(connection)),
        })
    }

    async fn ping(&self, connection: &mut Self::Connection) -> Result<(), BackendError> {
        connection
            .with(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map(|_| ())
                    .map_err(|error| error.to_string())
            })
            .await
            .map_err(BackendError::new)
    }

    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError> {
        // A clone still alive elsewhere keeps the handle; it closes on drop.
        let Ok(mutex) = Arc::try_unwrap(connection.inner) else {
            return Ok(());
        };
        let connection = mutex
            .into_inner()
            .map_err(|_| BackendError::new("sqlite connection lock poisoned"))?;
        connection
            .close()
            .map_err(|(_, error)| to_connection_error(error))
    }
}

#[async_trait]
impl QueryBackend for SqliteBackend {
    async fn run_query(
        &self,
        connection: &mut Self::Connection,
        sql: &str,
    ) -> Result<TabularResult, QueryBackendError> {
        let sql = sql.to_string();
        connection
            .with(move |conn| run_blocking(conn, &sql))
            .await
            .map_err(QueryBackendError::new)
    }
}

fn database_path(config: &ConnectionConfig) -> Result<PathBuf, BackendError> {
    match &config.target {
        ConnectionTarget::EmbeddedFile { path } => Ok(path.clone()),
        ConnectionTarget::NamedInstance { server, .. } => Err(BackendError::new(format!(
            "{server} is a database server, not an embedded file"
        ))),
        ConnectionTarget::ConnectionString { .. } => Err(BackendError::new(
            "connection strings are served by the mysql backend",
        )),
    }
}

/// Opens an existing file read-only; a missing file is a connection failure
/// rather than a fresh empty database.
fn open(path: &Path) -> Result<Connection, rusqlite::Error> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

fn run_blocking(connection: &Connection, sql: &str) -> Result<TabularResult, String> {
    let mut statement = connection.prepare(sql).map_err(|error| error.to_string())?;
    let columns = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let width = columns.len();

    let mut rows = statement.query([]).map_err(|error| error.to_string())?;
    let mut collected = Vec::new();
    while let Some(row) = rows.next().map_err(|error| error.to_string())? {
        let mut cells = Vec::with_capacity(width);
        for index in 0..width {
            let value = row.get_ref(index).map_err(|error| error.to_string())?;
            cells.push(sqlite_value_to_cell(value));
        }
        collected.push(cells);
    }

    TabularResult::new(columns, collected).map_err(|error| error.to_string())
}

fn sqlite_value_to_cell(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(value) => CellValue::Integer(value),
        ValueRef::Real(value) => CellValue::Real(value),
        ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => CellValue::Text(format!("<{} bytes>", bytes.len())),
    }
}

fn to_connection_error(error: rusqlite::Error) -> BackendError {
    BackendError::new(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pantry_core::config::{ConnectionConfig, ConnectionTarget, Preset};
    use pantry_core::connection_manager::ConnectionBackend;
    use pantry_core::query_runner::QueryBackend;
    use pantry_core::tabular::CellValue;
    use rusqlite::Connection;
    use tempfile::TempDir;

    use super::SqliteBackend;

    fn file_config(path: &Path) -> ConnectionConfig {
        ConnectionConfig {
            name: "file".to_string(),
            target: ConnectionTarget::EmbeddedFile {
                path: path.to_path_buf(),
            },
        }
    }

    fn seeded_db(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("food.db");
        let conn = Connection::open(&path).expect("create db");
        conn.execute_batch(
            "CREATE TABLE FOOD_LISTING (Food_ID INTEGER, Food_Name TEXT, Quantity REAL, Note TEXT);
             INSERT INTO FOOD_LISTING VALUES (1, 'Bread', 2.5, NULL);
             INSERT INTO FOOD_LISTING VALUES (2, 'Rice', 4, 'bulk');",
        )
        .expect("seed db");
        path
    }

    #[tokio::test]
    async fn runs_query_and_maps_storage_classes() {
        let dir = TempDir::new().expect("temp dir");
        let config = file_config(&seeded_db(&dir));
        let backend = SqliteBackend;

        let mut connection = backend.connect(&config).await.expect("connect");
        backend.ping(&mut connection).await.expect("ping");
        let result = backend
            .run_query(&mut connection, "SELECT * FROM FOOD_LISTING ORDER BY Food_ID")
            .await
            .expect("query");
        backend.disconnect(connection).await.expect("disconnect");

        assert_eq!(
            result.columns(),
            ["Food_ID", "Food_Name", "Quantity", "Note"]
        );
        assert_eq!(
            result.rows()[0],
            vec![
                CellValue::Integer(1),
                CellValue::Text("Bread".to_string()),
                CellValue::Real(2.5),
                CellValue::Null,
            ]
        );
        assert_eq!(result.row_count(), 2);
    }

    #[tokio::test]
    async fn empty_result_keeps_column_names() {
        let dir = TempDir::new().expect("temp dir");
        let config = file_config(&seeded_db(&dir));
        let backend = SqliteBackend;

        let mut connection = backend.connect(&config).await.expect("connect");
        let result = backend
            .run_query(&mut connection, "SELECT Food_ID FROM FOOD_LISTING WHERE 1 = 0")
            .await
            .expect("query");

        assert!(result.is_empty());
        assert_eq!(result.columns(), ["Food_ID"]);
    }

    #[tokio::test]
    async fn bad_sql_reports_driver_message() {
        let dir = TempDir::new().expect("temp dir");
        let config = file_config(&seeded_db(&dir));
        let backend = SqliteBackend;

        let mut connection = backend.connect(&config).await.expect("connect");
        let err = backend
            .run_query(&mut connection, "SELECT Foo FROM FOOD_LISTING")
            .await
            .expect_err("unknown column");

        assert!(err.to_string().contains("no such column"));
    }

    #[tokio::test]
    async fn missing_file_fails_to_connect() {
        let dir = TempDir::new().expect("temp dir");
        let config = file_config(&dir.path().join("absent.db"));

        let err = SqliteBackend
            .connect(&config)
            .await
            .expect_err("missing file must not be created");

        assert!(err.to_string().contains("unable to open"));
        assert!(!dir.path().join("absent.db").exists());
    }

    #[tokio::test]
    async fn server_targets_are_refused() {
        let config = Preset::NamedInstance.config().connection;
        assert!(SqliteBackend.connect(&config).await.is_err());
    }
}
