//! Backend composition.
//!
//! The pool is generic over one connector type, so the concrete backends are
//! held in enums and dispatched by match.

use async_trait::async_trait;
use docgate_models::{Document, FindOptions, MutationSummary, Page, QueryFilter, UpsertSummary};
use docgate_pool::Connector;
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::memory::{MemoryConnector, MemorySession};
use crate::rest::{RestConnector, RestSession};
use crate::session::DocumentSession;

/// Connector for any supported backend.
#[derive(Clone)]
pub enum StoreConnector {
    Rest(RestConnector),
    Memory(MemoryConnector),
}

/// Session for any supported backend.
pub enum StoreSession {
    Rest(RestSession),
    Memory(MemorySession),
}

impl StoreConnector {
    pub fn backend(&self) -> &'static str {
        match self {
            StoreConnector::Rest(_) => "rest",
            StoreConnector::Memory(_) => "memory",
        }
    }
}

impl From<RestConnector> for StoreConnector {
    fn from(connector: RestConnector) -> Self {
        StoreConnector::Rest(connector)
    }
}

impl From<MemoryConnector> for StoreConnector {
    fn from(connector: MemoryConnector) -> Self {
        StoreConnector::Memory(connector)
    }
}

#[async_trait]
impl Connector for StoreConnector {
    type Connection = StoreSession;
    type Error = StoreError;

    async fn connect(&self) -> StoreResult<StoreSession> {
        match self {
            StoreConnector::Rest(c) => c.connect().await.map(StoreSession::Rest),
            StoreConnector::Memory(c) => c.connect().await.map(StoreSession::Memory),
        }
    }
}

impl StoreSession {
    fn inner(&self) -> &dyn DocumentSession {
        match self {
            StoreSession::Rest(s) => s,
            StoreSession::Memory(s) => s,
        }
    }
}

#[async_trait]
impl DocumentSession for StoreSession {
    fn backend(&self) -> &'static str {
        self.inner().backend()
    }

    async fn find(
        &self,
        collection: &str,
        filter: &QueryFilter,
        options: &FindOptions,
    ) -> StoreResult<Page<Document>> {
        self.inner().find(collection, filter, options).await
    }

    async fn count(&self, collection: &str, filter: &QueryFilter) -> StoreResult<u64> {
        self.inner().count(collection, filter).await
    }

    async fn upsert_batch(&self, collection: &str, documents: &[Document]) -> StoreResult<UpsertSummary> {
        self.inner().upsert_batch(collection, documents).await
    }

    async fn delete_many(&self, collection: &str, filter: &QueryFilter, allow_empty: bool) -> StoreResult<u64> {
        self.inner().delete_many(collection, filter, allow_empty).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &QueryFilter,
        set: &Map<String, Value>,
        allow_empty: bool,
    ) -> StoreResult<MutationSummary> {
        self.inner().update_many(collection, filter, set, allow_empty).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner().ping().await
    }
}
