//! Store error types.

use docgate_auth::AuthError;
use docgate_models::ModelError;
use docgate_pool::PoolError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Invalid input: {0}")]
    Model(#[from] ModelError),

    #[error("Refusing to {operation} with an empty filter; pass allow_empty_filter to opt in")]
    EmptyFilter { operation: &'static str },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid store configuration: {0}")]
    Config(String),
}

/// Default back-off when a 429 carries no usable Retry-After.
const DEFAULT_RETRY_AFTER_MS: u64 = 1000;

impl StoreError {
    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map a non-success HTTP status onto an error.
    pub fn from_http_status(status: u16, msg: impl Into<String>) -> Self {
        Self::from_http_status_with_retry_after(status, msg, None)
    }

    /// Same as [`StoreError::from_http_status`], with the parsed Retry-After in ms.
    pub fn from_http_status_with_retry_after(
        status: u16,
        msg: impl Into<String>,
        retry_after_ms: Option<u64>,
    ) -> Self {
        let msg = msg.into();
        match status {
            401 | 403 => Self::Auth(AuthError::rejected(msg)),
            409 => Self::Conflict(msg),
            429 => Self::RateLimited(retry_after_ms.unwrap_or(DEFAULT_RETRY_AFTER_MS)),
            500..=599 => Self::ServerError(status, msg),
            _ => Self::RequestFailed(msg),
        }
    }

    /// HTTP status this error corresponds to, if it came from one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            StoreError::Auth(AuthError::Rejected(_)) => Some(401),
            StoreError::Conflict(_) => Some(409),
            StoreError::RateLimited(_) => Some(429),
            StoreError::ServerError(status, _) => Some(*status),
            StoreError::RequestFailed(_) | StoreError::EmptyFilter { .. } | StoreError::Model(_) => {
                Some(400)
            }
            StoreError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Server-requested back-off, for 429 responses.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            StoreError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Network(_) | StoreError::RateLimited(_) | StoreError::ServerError(..) => {
                true
            }
            StoreError::Auth(e) => e.is_retryable(),
            StoreError::Pool(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// True when the leased connection should not be reused.
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Network(_) | StoreError::InvalidResponse(_))
    }
}
