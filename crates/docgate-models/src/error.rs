//! Model error types.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Record is missing key field: {0}")]
    MissingKeyField(String),

    #[error("Key field '{field}' has a value that cannot form a key: {reason}")]
    InvalidKeyValue { field: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }
}
