use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::connection_manager::{ConnectionBackend, ConnectionError, ConnectionProvider};
use crate::data_source::{DataSourceDescriptor, DataSourceError, RowCap, SqlDialect};
use crate::statement_guard::{PlaygroundPolicy, StatementRejection};
use crate::tabular::TabularResult;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryBackendError {
    message: String,
}

impl QueryBackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait QueryBackend: ConnectionBackend {
    async fn run_query(
        &self,
        connection: &mut Self::Connection,
        sql: &str,
    ) -> Result<TabularResult, QueryBackendError>;
}

/// The driver's message for a statement that could not be run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Rejected(#[from] StatementRejection),
    #[error(transparent)]
    Source(#[from] DataSourceError),
}

#[derive(Debug)]
pub struct QueryExecutor<B: QueryBackend> {
    provider: ConnectionProvider<B>,
    dialect: SqlDialect,
    policy: PlaygroundPolicy,
}

impl<B: QueryBackend> QueryExecutor<B> {
    #[must_use]
    pub fn new(provider: ConnectionProvider<B>, policy: PlaygroundPolicy) -> Self {
        let dialect = provider.config().dialect();
        Self {
            provider,
            dialect,
            policy,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &ConnectionProvider<B> {
        &self.provider
    }

    #[must_use]
    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Runs `sql` verbatim on an already acquired connection.
    pub async fn execute(
        &self,
        connection: &mut B::Connection,
        sql: &str,
    ) -> Result<TabularResult, QueryError> {
        let started_at = Instant::now();
        match self.provider.backend().run_query(connection, sql).await {
            Ok(result) => {
                tracing::info!(
                    sql,
                    rows = result.row_count(),
                    elapsed_ms = elapsed_ms(started_at),
                    "query succeeded"
                );
                Ok(result)
            }
            Err(error) => {
                tracing::warn!(
                    sql,
                    %error,
                    elapsed_ms = elapsed_ms(started_at),
                    "query failed"
                );
                Err(QueryError::new(error.to_string()))
            }
        }
    }

    /// One scoped acquisition: connect, run, release. The connection is
    /// released on the error path too.
    pub async fn fetch_sql(&self, sql: &str) -> Result<TabularResult, FetchError> {
        let mut connection = self.provider.acquire().await?;
        let outcome = self.execute(&mut connection, sql).await;
        self.provider.release(connection).await;
        Ok(outcome?)
    }

    /// Everything one interaction needs, on one scoped connection. Entries
    /// that already failed are passed through untouched; `verify` pings the
    /// connection before the first statement. Only acquiring or verifying the
    /// connection fails the batch as a whole.
    pub async fn fetch_batch(
        &self,
        planned: Vec<Result<String, FetchError>>,
        verify: bool,
    ) -> Result<Vec<Result<TabularResult, FetchError>>, ConnectionError> {
        if !verify && planned.iter().all(Result::is_err) {
            return Ok(planned.into_iter().filter_map(Result::err).map(Err).collect());
        }

        let mut connection = self.provider.acquire().await?;
        if verify {
            if let Err(error) = self.provider.ping(&mut connection).await {
                self.provider.release(connection).await;
                return Err(error);
            }
        }

        let mut outcomes = Vec::with_capacity(planned.len());
        for entry in planned {
            let outcome = match entry {
                Ok(sql) => self
                    .execute(&mut connection, &sql)
                    .await
                    .map_err(FetchError::from),
                Err(error) => Err(error),
            };
            outcomes.push(outcome);
        }
        self.provider.release(connection).await;
        Ok(outcomes)
    }

    pub async fn fetch(
        &self,
        source: &DataSourceDescriptor,
        cap: RowCap,
    ) -> Result<TabularResult, FetchError> {
        self.fetch_sql(&source.to_sql(self.dialect, cap)).await
    }

    /// Free-form SQL from the playground, subject to the configured policy.
    pub async fn fetch_playground(
        &self,
        source: &DataSourceDescriptor,
    ) -> Result<TabularResult, FetchError> {
        let sql = source.to_sql(self.dialect, RowCap::Unlimited);
        if let Err(rejection) = self.policy.check(&sql, self.dialect) {
            tracing::warn!(%rejection, "playground statement rejected");
            return Err(rejection.into());
        }
        self.fetch_sql(&sql).await
    }
}

fn elapsed_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}
