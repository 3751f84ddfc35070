//! Collection handlers.
//!
//! Filters arrive as Mongo-style JSON objects and are parsed with
//! [`QueryFilter::from_json`] before reaching the store.

use axum::extract::{Path, State};
use axum::Json;
use docgate_models::{
    Document, FindOptions, MutationOptions, MutationSummary, Page, QueryFilter, UpsertSummary,
};
use docgate_store::DocumentRepository;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MAX_COLLECTION_LEN: usize = 128;

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub filter: Value,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub filter: Value,
    pub limit: Option<u32>,
    pub page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertRequest {
    /// Natural key fields. When empty, each document must carry an `_id`.
    #[serde(default)]
    pub key_fields: Vec<String>,
    pub documents: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub filter: Value,
    #[serde(default)]
    pub allow_empty_filter: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub filter: Value,
    pub set: Map<String, Value>,
    /// Key fields the update must not touch. Required so the caller states
    /// the collection's key; `[]` for collections keyed by `_id` alone.
    pub key_fields: Option<Vec<String>>,
    #[serde(default)]
    pub allow_empty_filter: bool,
}

#[derive(Debug, Serialize)]
pub struct FindResponse {
    pub document: Option<Document>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}

/// First document matching the filter, or `null`.
pub async fn find_document(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<FilterRequest>,
) -> ApiResult<Json<FindResponse>> {
    let repo = repository(&state, &collection, Vec::new())?;
    let filter = parse_filter(&body.filter)?;
    let document = repo.find(&filter).await?;
    Ok(Json(FindResponse { document }))
}

/// One page of matching documents.
pub async fn query_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<QueryRequest>,
) -> ApiResult<Json<Page<Document>>> {
    let repo = repository(&state, &collection, Vec::new())?;
    let filter = parse_filter(&body.filter)?;
    let options = FindOptions {
        limit: body.limit,
        page_token: body.page_token,
    };
    let page = repo.find_page(&filter, &options).await?;
    Ok(Json(page))
}

pub async fn count_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<FilterRequest>,
) -> ApiResult<Json<CountResponse>> {
    let repo = repository(&state, &collection, Vec::new())?;
    let filter = parse_filter(&body.filter)?;
    let count = repo.count(&filter).await?;
    Ok(Json(CountResponse { count }))
}

/// Idempotent upsert keyed by `key_fields`, or by each document's `_id`
/// when no key fields are given.
pub async fn upsert_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<UpsertRequest>,
) -> ApiResult<Json<UpsertSummary>> {
    let repo = repository(&state, &collection, body.key_fields)?;
    let documents = body
        .documents
        .into_iter()
        .map(Document::from_value_with_id)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::Store(e.into()))?;

    debug!(collection = %collection, count = documents.len(), "upsert request");
    let summary = repo.upsert_many(documents).await?;
    Ok(Json(summary))
}

pub async fn delete_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<DeleteRequest>,
) -> ApiResult<Json<DeleteResponse>> {
    let repo = repository(&state, &collection, Vec::new())?;
    let filter = parse_filter(&body.filter)?;
    let deleted = repo
        .delete_many(&filter, mutation_options(body.allow_empty_filter))
        .await?;
    Ok(Json(DeleteResponse { deleted }))
}

pub async fn update_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> ApiResult<Json<MutationSummary>> {
    let key_fields = body.key_fields.ok_or_else(|| {
        ApiError::bad_request("update requires key_fields ([] when keyed by _id alone)")
    })?;
    let repo = repository(&state, &collection, key_fields)?;
    let filter = parse_filter(&body.filter)?;
    let summary = repo
        .update_many(&filter, &body.set, mutation_options(body.allow_empty_filter))
        .await?;
    Ok(Json(summary))
}

fn repository(state: &AppState, collection: &str, key_fields: Vec<String>) -> ApiResult<DocumentRepository> {
    validate_collection(collection)?;
    if key_fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ApiError::bad_request("key_fields cannot contain empty names"));
    }
    Ok(state.store.repository(collection, key_fields))
}

fn parse_filter(value: &Value) -> ApiResult<QueryFilter> {
    QueryFilter::from_json(value).map_err(|e| ApiError::Store(e.into()))
}

fn mutation_options(allow_empty_filter: bool) -> MutationOptions {
    MutationOptions { allow_empty_filter }
}

fn validate_collection(name: &str) -> ApiResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_COLLECTION_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("invalid collection name: {:?}", name)))
    }
}
