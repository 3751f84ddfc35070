//! Backend session contract.

use async_trait::async_trait;
use docgate_models::{Document, FindOptions, MutationSummary, Page, QueryFilter, UpsertSummary};
use serde_json::{Map, Value};

use crate::error::StoreResult;

/// Operations one leased connection can run against the store.
///
/// Filters arrive validated; empty-filter checks happen in the repository and
/// again in the backend when `allow_empty` is false.
#[async_trait]
pub trait DocumentSession: Send + Sync {
    /// Backend label for logs and metrics.
    fn backend(&self) -> &'static str;

    async fn find(
        &self,
        collection: &str,
        filter: &QueryFilter,
        options: &FindOptions,
    ) -> StoreResult<Page<Document>>;

    async fn count(&self, collection: &str, filter: &QueryFilter) -> StoreResult<u64>;

    /// Replace-by-id write of documents that already carry their id.
    async fn upsert_batch(&self, collection: &str, documents: &[Document]) -> StoreResult<UpsertSummary>;

    async fn delete_many(&self, collection: &str, filter: &QueryFilter, allow_empty: bool) -> StoreResult<u64>;

    async fn update_many(
        &self,
        collection: &str,
        filter: &QueryFilter,
        set: &Map<String, Value>,
        allow_empty: bool,
    ) -> StoreResult<MutationSummary>;

    async fn ping(&self) -> StoreResult<()>;
}
