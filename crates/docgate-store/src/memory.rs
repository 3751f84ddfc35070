//! In-process backend for development and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use docgate_models::{Document, FindOptions, MutationSummary, Page, QueryFilter, UpsertSummary};
use docgate_pool::Connector;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::session::DocumentSession;

type Collection = BTreeMap<String, Document>;

/// Shared document store keyed by collection and document id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    /// All documents of a collection in id order.
    pub async fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// Hands out sessions over one shared [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Connection = MemorySession;
    type Error = StoreError;

    async fn connect(&self) -> StoreResult<MemorySession> {
        Ok(MemorySession {
            store: Arc::clone(&self.store),
        })
    }
}

#[derive(Debug)]
pub struct MemorySession {
    store: Arc<MemoryStore>,
}

fn parse_page_token(token: Option<&str>) -> StoreResult<usize> {
    match token {
        None => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| StoreError::request_failed(format!("invalid page token: {}", raw))),
    }
}

#[async_trait]
impl DocumentSession for MemorySession {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find(
        &self,
        collection: &str,
        filter: &QueryFilter,
        options: &FindOptions,
    ) -> StoreResult<Page<Document>> {
        let offset = parse_page_token(options.page_token.as_deref())?;
        let collections = self.store.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Page::empty());
        };

        let mut matching = docs.values().filter(|d| filter.matches(d)).skip(offset);
        let items: Vec<Document> = match options.limit {
            Some(limit) => matching.by_ref().take(limit as usize).cloned().collect(),
            None => matching.by_ref().cloned().collect(),
        };
        let next = matching
            .next()
            .map(|_| (offset + items.len()).to_string());

        Ok(Page::new(items, next))
    }

    async fn count(&self, collection: &str, filter: &QueryFilter) -> StoreResult<u64> {
        let collections = self.store.collections.read().await;
        Ok(collections
            .get(collection)
            .map_or(0, |docs| docs.values().filter(|d| filter.matches(d)).count() as u64))
    }

    async fn upsert_batch(&self, collection: &str, documents: &[Document]) -> StoreResult<UpsertSummary> {
        let mut collections = self.store.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let mut summary = UpsertSummary::default();
        for doc in documents {
            let id = doc
                .id
                .clone()
                .ok_or_else(|| StoreError::request_failed("document has no id"))?;
            match docs.get(&id) {
                Some(existing) if existing == doc => summary.unchanged += 1,
                Some(_) => summary.updated += 1,
                None => summary.inserted += 1,
            }
            docs.insert(id, doc.clone());
        }
        Ok(summary)
    }

    async fn delete_many(&self, collection: &str, filter: &QueryFilter, allow_empty: bool) -> StoreResult<u64> {
        if filter.is_empty() && !allow_empty {
            return Err(StoreError::EmptyFilter { operation: "delete" });
        }

        let mut collections = self.store.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|_, d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &QueryFilter,
        set: &Map<String, Value>,
        allow_empty: bool,
    ) -> StoreResult<MutationSummary> {
        if filter.is_empty() && !allow_empty {
            return Err(StoreError::EmptyFilter { operation: "update" });
        }

        let mut collections = self.store.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(MutationSummary::default());
        };

        let mut summary = MutationSummary::default();
        for doc in docs.values_mut().filter(|d| filter.matches(d)) {
            summary.matched += 1;
            if doc.apply_set(set) {
                summary.modified += 1;
            }
        }
        Ok(summary)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        Document::from_value(value).unwrap().with_id(id)
    }

    async fn seeded() -> MemorySession {
        let session = MemoryConnector::new(MemoryStore::new()).connect().await.unwrap();
        let docs: Vec<Document> = (1..=5)
            .map(|i| doc(&format!("f{}", i), json!({"fixture_id": i, "home": i % 2 == 0})))
            .collect();
        session.upsert_batch("fixtures", &docs).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_find_pages_through_matches() {
        let session = seeded().await;
        let filter = QueryFilter::new();

        let first = session
            .find("fixtures", &filter, &FindOptions::with_limit(2))
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let last = session
            .find("fixtures", &filter, &FindOptions::with_limit(3).page_token("2"))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 3);
        assert!(!last.has_next());
    }

    #[tokio::test]
    async fn test_find_unknown_collection_is_empty() {
        let session = seeded().await;
        let page = session
            .find("missing", &QueryFilter::new(), &FindOptions::default())
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_batch_classifies_writes() {
        let session = seeded().await;
        let summary = session
            .upsert_batch(
                "fixtures",
                &[
                    doc("f1", json!({"fixture_id": 1, "home": false})),
                    doc("f2", json!({"fixture_id": 2, "home": false})),
                    doc("f9", json!({"fixture_id": 9, "home": true})),
                ],
            )
            .await
            .unwrap();
        assert_eq!(summary, UpsertSummary { inserted: 1, updated: 1, unchanged: 1 });
    }

    #[tokio::test]
    async fn test_upsert_batch_requires_id() {
        let session = seeded().await;
        let err = session
            .upsert_batch("fixtures", &[Document::from_value(json!({"a": 1})).unwrap()])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_delete_many_guards_empty_filter() {
        let session = seeded().await;
        let err = session
            .delete_many("fixtures", &QueryFilter::new(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmptyFilter { .. }));

        let deleted = session
            .delete_many("fixtures", &QueryFilter::new().eq("home", true), false)
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(session.store.len("fixtures").await, 3);
    }

    #[tokio::test]
    async fn test_update_many_counts_modified() {
        let session = seeded().await;
        let mut set = Map::new();
        set.insert("home".to_string(), json!(true));

        let summary = session
            .update_many("fixtures", &QueryFilter::new().lte("fixture_id", 3), &set, false)
            .await
            .unwrap();
        assert_eq!(summary, MutationSummary { matched: 3, modified: 2 });
    }
}
