use async_trait::async_trait;
use mysql_async::Conn;
use pantry_core::config::{ConnectionConfig, ConnectionTarget};
use pantry_core::connection_manager::{BackendError, ConnectionBackend};
use pantry_core::query_runner::{QueryBackend, QueryBackendError};
use pantry_core::tabular::TabularResult;

use crate::mysql::MysqlBackend;
use crate::sqlite::{SqliteBackend, SqliteConnection};

/// Picks the driver from the configured target kind.
#[derive(Debug, Clone, Copy)]
pub enum AnyBackend {
    Mysql(MysqlBackend),
    Sqlite(SqliteBackend),
}

#[derive(Debug)]
pub enum AnyConnection {
    Mysql(Conn),
    Sqlite(SqliteConnection),
}

impl AnyBackend {
    #[must_use]
    pub fn for_config(config: &ConnectionConfig) -> Self {
        match config.target {
            ConnectionTarget::EmbeddedFile { .. } => Self::Sqlite(SqliteBackend),
            ConnectionTarget::NamedInstance { .. } | ConnectionTarget::ConnectionString { .. } => {
                Self::Mysql(MysqlBackend)
            }
        }
    }
}

fn mismatched() -> BackendError {
    BackendError::new("connection was opened by a different driver")
}

#[async_trait]
impl ConnectionBackend for AnyBackend {
    type Connection = AnyConnection;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection, BackendError> {
        match self {
            Self::Mysql(backend) => backend.connect(config).await.map(AnyConnection::Mysql),
            Self::Sqlite(backend) => backend.connect(config).await.map(AnyConnection::Sqlite),
        }
    }

    async fn ping(&self, connection: &mut Self::Connection) -> Result<(), BackendError> {
        match (self, connection) {
            (Self::Mysql(backend), AnyConnection::Mysql(conn)) => backend.ping(conn).await,
            (Self::Sqlite(backend), AnyConnection::Sqlite(conn)) => backend.ping(conn).await,
            _ => Err(mismatched()),
        }
    }

    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError> {
        match (self, connection) {
            (Self::Mysql(backend), AnyConnection::Mysql(conn)) => backend.disconnect(conn).await,
            (Self::Sqlite(backend), AnyConnection::Sqlite(conn)) => backend.disconnect(conn).await,
            _ => Err(mismatched()),
        }
    }
}

#[async_trait]
impl QueryBackend for AnyBackend {
    async fn run_query(
        &self,
        connection: &mut Self::Connection,
        sql: &str,
    ) -> Result<TabularResult, QueryBackendError> {
        match (self, connection) {
            (Self::Mysql(backend), AnyConnection::Mysql(conn)) => {
                backend.run_query(conn, sql).await
            }
            (Self::Sqlite(backend), AnyConnection::Sqlite(conn)) => {
                backend.run_query(conn, sql).await
            }
            _ => Err(QueryBackendError::new(mismatched().to_string())),
        }
    }
}
