//! Document store client for docgate.
//!
//! This crate provides:
//! - Pooled sessions over REST and in-memory backends
//! - Collection repositories with filtered reads and idempotent upserts
//! - Guarded delete/update (empty filters are opt-in)
//! - Caller opt-in retry with backoff
//! - Request metrics and tracing spans

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod repository;
pub mod rest;
pub mod retry;
pub mod session;
pub mod typed;
pub mod types;


pub use backend::{StoreConnector, StoreSession};
pub use client::DocGateClient;
pub use config::{BackendKind, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryConnector, MemoryStore};
pub use repository::DocumentRepository;
pub use rest::RestConnector;
pub use retry::{with_retry, RetryConfig};
pub use session::DocumentSession;
pub use typed::TypedRepository;

pub use docgate_models::{
    Document, FindOptions, MutationOptions, MutationSummary, Page, QueryFilter, Record,
    UpsertSummary,
};
