//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised while leasing connections.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No slot became free within the acquire timeout.
    #[error("Connection pool exhausted (waited {timeout:?})")]
    Exhausted { timeout: Duration },

    #[error("Connection pool is closed")]
    Closed,

    #[error("Failed to open connection: {0}")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
}

impl PoolError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::Exhausted { .. } | PoolError::Connect(_))
    }
}
