//! Axum HTTP front for the docgate document store.
//!
//! This crate provides:
//! - Collection endpoints for find, query, count, upsert, delete and update
//! - Optional inbound API-key checks
//! - Rate limiting and security headers
//! - Prometheus metrics and health probes

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
