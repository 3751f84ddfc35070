//! API error types.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use docgate_auth::AuthError;
use docgate_pool::PoolError;
use docgate_store::StoreError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(e) => match e {
                StoreError::Model(_) | StoreError::EmptyFilter { .. } | StoreError::RequestFailed(_) => {
                    StatusCode::BAD_REQUEST
                }
                StoreError::Conflict(_) => StatusCode::CONFLICT,
                StoreError::Pool(PoolError::Exhausted { .. }) | StoreError::Pool(PoolError::Closed) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                StoreError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                StoreError::Auth(AuthError::Rejected(_)) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Seconds the caller should wait before trying again.
    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ApiError::Store(StoreError::Pool(PoolError::Exhausted { .. })) => Some(1),
            ApiError::Store(StoreError::RateLimited(ms)) => Some(ms.div_ceil(1000).max(1)),
            _ => None,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::Store(StoreError::EmptyFilter { .. }) => Some("empty_filter"),
            ApiError::Store(StoreError::Model(_)) => Some("invalid_input"),
            ApiError::Store(StoreError::Pool(PoolError::Exhausted { .. })) => Some("pool_exhausted"),
            ApiError::Store(StoreError::RateLimited(_)) => Some("rate_limited"),
            ApiError::Store(StoreError::Auth(AuthError::Rejected(_))) => Some("credential_rejected"),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, "Request failed");
            if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                "An internal error occurred".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            detail,
            code: self.code(),
        };
        let mut response = (status, Json(body)).into_response();

        if let Some(secs) = self.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
