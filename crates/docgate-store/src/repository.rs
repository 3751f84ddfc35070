//! Collection-scoped repository over pooled sessions.

use std::collections::HashMap;

use docgate_models::{
    Document, FindOptions, MutationOptions, MutationSummary, NaturalKey, Page, QueryFilter,
    UpsertSummary,
};
use docgate_pool::{Pool, PooledConnection};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::backend::{StoreConnector, StoreSession};
use crate::error::{StoreError, StoreResult};
use crate::session::DocumentSession;

/// Repository for one collection.
///
/// Each call leases a session from the pool and returns it when done. A
/// session that hit a transport error is discarded instead.
#[derive(Clone)]
pub struct DocumentRepository {
    pool: Pool<StoreConnector>,
    collection: String,
    key: NaturalKey,
    max_batch_size: usize,
}

impl DocumentRepository {
    pub(crate) fn new(
        pool: Pool<StoreConnector>,
        collection: impl Into<String>,
        key: NaturalKey,
        max_batch_size: usize,
    ) -> Self {
        Self {
            pool,
            collection: collection.into(),
            key,
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> &NaturalKey {
        &self.key
    }

    async fn session(&self) -> StoreResult<PooledConnection<StoreConnector>> {
        Ok(self.pool.acquire().await?)
    }

    /// Return the session to the pool, or discard it after a transport error.
    fn finish<T>(&self, session: PooledConnection<StoreConnector>, result: &StoreResult<T>) {
        if let Err(e) = result {
            if e.is_transport() {
                warn!(collection = %self.collection, error = %e, "Discarding session after transport error");
                session.discard();
                return;
            }
        }
        drop(session);
    }

    /// First document matching the filter, or `None`.
    pub async fn find(&self, filter: &QueryFilter) -> StoreResult<Option<Document>> {
        filter.validate()?;
        let session = self.session().await?;
        let result = session
            .find(&self.collection, filter, &FindOptions::with_limit(1))
            .await;
        self.finish(session, &result);

        let found = result?.items.into_iter().next();
        debug!(
            collection = %self.collection,
            filter = %filter,
            found = found.is_some(),
            "find"
        );
        Ok(found)
    }

    /// All documents matching the filter, following page tokens.
    pub async fn find_many(&self, filter: &QueryFilter) -> StoreResult<Vec<Document>> {
        filter.validate()?;
        let session = self.session().await?;
        let result = self.collect_pages(&session, filter).await;
        self.finish(session, &result);

        let documents = result?;
        debug!(
            collection = %self.collection,
            filter = %filter,
            count = documents.len(),
            "find_many"
        );
        Ok(documents)
    }

    async fn collect_pages(&self, session: &StoreSession, filter: &QueryFilter) -> StoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut options = FindOptions::default();
        loop {
            let page = session.find(&self.collection, filter, &options).await?;
            documents.extend(page.items);
            match page.next_page_token {
                // A token repeating the one just sent would loop forever
                Some(token) if options.page_token.as_deref() != Some(token.as_str()) => {
                    options.page_token = Some(token);
                }
                Some(token) => {
                    return Err(StoreError::invalid_response(format!(
                        "store repeated page token {}",
                        token
                    )))
                }
                None => return Ok(documents),
            }
        }
    }

    /// One page of matching documents.
    ///
    /// A limit of zero is rejected, since its page token could never advance.
    pub async fn find_page(&self, filter: &QueryFilter, options: &FindOptions) -> StoreResult<Page<Document>> {
        filter.validate()?;
        if options.limit == Some(0) {
            return Err(StoreError::request_failed("limit must be at least 1"));
        }
        let session = self.session().await?;
        let result = session.find(&self.collection, filter, options).await;
        self.finish(session, &result);
        result
    }

    pub async fn count(&self, filter: &QueryFilter) -> StoreResult<u64> {
        filter.validate()?;
        let session = self.session().await?;
        let result = session.count(&self.collection, filter).await;
        self.finish(session, &result);
        result
    }

    /// Idempotent upsert keyed by the natural key.
    ///
    /// Empty input returns at once without leasing a session. Duplicate keys
    /// within one call collapse to the last occurrence.
    pub async fn upsert_many(&self, records: Vec<Document>) -> StoreResult<UpsertSummary> {
        if records.is_empty() {
            debug!(collection = %self.collection, "upsert_many called with no records");
            return Ok(UpsertSummary::default());
        }

        let received = records.len();
        let documents = self.keyed(records)?;
        let batches = documents.len().div_ceil(self.max_batch_size);

        let session = self.session().await?;
        let result = self.write_batches(&session, &documents).await;
        self.finish(session, &result);

        let summary = result?;
        info!(
            collection = %self.collection,
            received,
            unique = documents.len(),
            batches,
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            "upsert_many"
        );
        Ok(summary)
    }

    /// Assign each record its natural key as id, keeping the last duplicate.
    fn keyed(&self, records: Vec<Document>) -> StoreResult<Vec<Document>> {
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(records.len());
        let mut documents: Vec<Document> = Vec::with_capacity(records.len());

        for mut record in records {
            let key = self.key.key_for(&record)?;
            record.id = Some(key.clone());
            match positions.get(&key) {
                Some(&at) => documents[at] = record,
                None => {
                    positions.insert(key, documents.len());
                    documents.push(record);
                }
            }
        }
        Ok(documents)
    }

    async fn write_batches(&self, session: &StoreSession, documents: &[Document]) -> StoreResult<UpsertSummary> {
        let mut summary = UpsertSummary::default();
        for batch in documents.chunks(self.max_batch_size) {
            summary += session.upsert_batch(&self.collection, batch).await?;
        }
        Ok(summary)
    }

    /// Delete matching documents. Empty filters need an explicit opt-in.
    pub async fn delete_many(&self, filter: &QueryFilter, options: MutationOptions) -> StoreResult<u64> {
        self.guard_filter(filter, options, "delete")?;
        let session = self.session().await?;
        let result = session
            .delete_many(&self.collection, filter, options.allow_empty_filter)
            .await;
        self.finish(session, &result);

        let deleted = result?;
        info!(collection = %self.collection, filter = %filter, deleted, "delete_many");
        Ok(deleted)
    }

    /// Set fields on matching documents. Empty filters need an explicit opt-in.
    pub async fn update_many(
        &self,
        filter: &QueryFilter,
        set: &Map<String, Value>,
        options: MutationOptions,
    ) -> StoreResult<MutationSummary> {
        self.guard_filter(filter, options, "update")?;
        if set.is_empty() {
            return Err(StoreError::request_failed("update requires at least one field to set"));
        }
        if let Some(field) = set.keys().find(|f| self.touches_key(f)) {
            return Err(StoreError::request_failed(format!(
                "update cannot change key field {}",
                field
            )));
        }

        let session = self.session().await?;
        let result = session
            .update_many(&self.collection, filter, set, options.allow_empty_filter)
            .await;
        self.finish(session, &result);

        let summary = result?;
        info!(
            collection = %self.collection,
            filter = %filter,
            matched = summary.matched,
            modified = summary.modified,
            "update_many"
        );
        Ok(summary)
    }

    fn guard_filter(&self, filter: &QueryFilter, options: MutationOptions, operation: &'static str) -> StoreResult<()> {
        filter.validate()?;
        if filter.is_empty() {
            if !options.allow_empty_filter {
                return Err(StoreError::EmptyFilter { operation });
            }
            warn!(collection = %self.collection, operation, "Running with an empty filter");
        }
        Ok(())
    }

    fn touches_key(&self, path: &str) -> bool {
        path == docgate_models::document::ID_FIELD
            || self.key.fields().iter().any(|k| {
                path == k
                    || path.starts_with(&format!("{}.", k))
                    || k.starts_with(&format!("{}.", path))
            })
    }
}
