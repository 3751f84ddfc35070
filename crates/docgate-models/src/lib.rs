//! Shared data models for docgate.
//!
//! This crate provides Serde-serializable types for:
//! - JSON documents returned by the store
//! - Query filters (builder and Mongo-style parsing)
//! - Natural keys used by idempotent upserts
//! - Pagination and mutation summaries

pub mod document;
pub mod error;
pub mod filter;
pub mod key;
pub mod page;

// Re-export common types
pub use document::Document;
pub use error::{ModelError, ModelResult};
pub use filter::{FieldFilter, FilterOp, QueryFilter};
pub use key::{NaturalKey, Record, KEY_SEPARATOR};
pub use page::{FindOptions, MutationOptions, MutationSummary, Page, UpsertSummary};
