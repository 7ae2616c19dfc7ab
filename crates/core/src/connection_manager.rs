use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ConnectionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ConnectionBackend {
    type Connection: Send;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection, BackendError>;
    async fn ping(&self, connection: &mut Self::Connection) -> Result<(), BackendError>;
    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Database connection failed: {cause}")]
pub struct ConnectionError {
    pub target: String,
    pub cause: String,
}

/// Hands out one connection per operation. Nothing is held between calls.
#[derive(Debug)]
pub struct ConnectionProvider<B: ConnectionBackend> {
    backend: B,
    config: ConnectionConfig,
}

impl<B: ConnectionBackend> ConnectionProvider<B> {
    #[must_use]
    pub fn new(backend: B, config: ConnectionConfig) -> Self {
        Self { backend, config }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub async fn acquire(&self) -> Result<B::Connection, ConnectionError> {
        let connection = self
            .backend
            .connect(&self.config)
            .await
            .map_err(|error| self.connection_error(&error))?;
        tracing::debug!(target_name = %self.config.name, "connection acquired");
        Ok(connection)
    }

    /// Release never fails the caller; a failed disconnect is only logged.
    pub async fn release(&self, connection: B::Connection) {
        if let Err(error) = self.backend.disconnect(connection).await {
            tracing::warn!(target_name = %self.config.name, %error, "connection release failed");
        } else {
            tracing::debug!(target_name = %self.config.name, "connection released");
        }
    }

    pub async fn ping(&self, connection: &mut B::Connection) -> Result<(), ConnectionError> {
        self.backend
            .ping(connection)
            .await
            .map_err(|error| self.connection_error(&error))
    }

    /// Acquire, ping and release in one go.
    pub async fn probe(&self) -> Result<Duration, ConnectionError> {
        let started_at = Instant::now();
        let mut connection = self.acquire().await?;
        let ping = self.ping(&mut connection).await;
        self.release(connection).await;
        ping?;
        Ok(started_at.elapsed())
    }

    fn connection_error(&self, error: &BackendError) -> ConnectionError {
        tracing::error!(target_name = %self.config.name, %error, "connection failed");
        ConnectionError {
            target: self.config.describe(),
            cause: error.to_string(),
        }
    }
}
