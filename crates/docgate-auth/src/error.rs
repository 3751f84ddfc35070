//! Auth error types.

use std::time::Duration;

use thiserror::Error;

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors raised while obtaining tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity endpoint refused the credential. Retrying will not help.
    #[error("Credential rejected: {0}")]
    Rejected(String),

    /// Network failure or upstream 5xx/429. Safe to retry with backoff.
    #[error("Transient auth failure: {message}")]
    Transient {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Token refresh timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid auth configuration: {0}")]
    Config(String),
}

impl AuthError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient {
            message: msg.into(),
            source: None,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Transient { .. } | AuthError::Timeout(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Transient {
            message: format!("identity request failed: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(!AuthError::rejected("bad key").is_retryable());
        assert!(!AuthError::config("missing url").is_retryable());
        assert!(AuthError::transient("503").is_retryable());
        assert!(AuthError::Timeout(Duration::from_secs(1)).is_retryable());
    }
}
