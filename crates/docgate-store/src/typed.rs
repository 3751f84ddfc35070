//! Repository over typed records.

use std::marker::PhantomData;

use docgate_models::{
    Document, FindOptions, MutationOptions, MutationSummary, Page, QueryFilter, Record,
    UpsertSummary,
};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::repository::DocumentRepository;

/// [`DocumentRepository`] that converts to and from `T`.
pub struct TypedRepository<T: Record> {
    inner: DocumentRepository,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> Clone for TypedRepository<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Record> TypedRepository<T> {
    pub(crate) fn new(inner: DocumentRepository) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Untyped view of the same collection.
    pub fn documents(&self) -> &DocumentRepository {
        &self.inner
    }

    pub async fn find(&self, filter: &QueryFilter) -> StoreResult<Option<T>> {
        match self.inner.find(filter).await? {
            Some(doc) => Ok(Some(doc.into_record()?)),
            None => Ok(None),
        }
    }

    pub async fn find_many(&self, filter: &QueryFilter) -> StoreResult<Vec<T>> {
        self.inner
            .find_many(filter)
            .await?
            .into_iter()
            .map(|doc| doc.into_record::<T>().map_err(StoreError::from))
            .collect()
    }

    pub async fn find_page(&self, filter: &QueryFilter, options: &FindOptions) -> StoreResult<Page<T>> {
        Ok(self.inner.find_page(filter, options).await?.try_map(Document::into_record)?)
    }

    pub async fn count(&self, filter: &QueryFilter) -> StoreResult<u64> {
        self.inner.count(filter).await
    }

    pub async fn upsert_many(&self, records: &[T]) -> StoreResult<UpsertSummary> {
        let documents = records
            .iter()
            .map(Document::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        self.inner.upsert_many(documents).await
    }

    pub async fn delete_many(&self, filter: &QueryFilter, options: MutationOptions) -> StoreResult<u64> {
        self.inner.delete_many(filter, options).await
    }

    pub async fn update_many(
        &self,
        filter: &QueryFilter,
        set: &Map<String, Value>,
        options: MutationOptions,
    ) -> StoreResult<MutationSummary> {
        self.inner.update_many(filter, set, options).await
    }
}
