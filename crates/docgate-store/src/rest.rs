//! REST document store backend.
//!
//! - Auth header contract (bearer token plus optional `x-api-key`)
//! - One replay after an expired-token 401
//! - HTTP client tuning (timeouts, one idle connection per session)
//! - Observability (tracing spans, metrics)

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use docgate_auth::{authorize, TokenProvider};
use docgate_models::{Document, FindOptions, MutationSummary, Page, QueryFilter, UpsertSummary};
use docgate_pool::Connector;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info_span, Instrument};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_request;
use crate::session::DocumentSession;
use crate::types::{
    BatchUpsertRequest, CountRequest, CountResponse, DeleteManyRequest, DeleteManyResponse,
    QueryRequest, QueryResponse, UpdateManyRequest,
};

const BACKEND: &str = "rest";

// =============================================================================
// Connector
// =============================================================================

/// Opens HTTP sessions against a REST document store.
#[derive(Clone)]
pub struct RestConnector {
    base_url: String,
    tokens: Option<Arc<TokenProvider>>,
    api_key: Option<String>,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl RestConnector {
    pub fn new(
        endpoint: &str,
        tokens: Option<Arc<TokenProvider>>,
        api_key: Option<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> StoreResult<Self> {
        url::Url::parse(endpoint)
            .map_err(|e| StoreError::config(format!("invalid endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            tokens,
            api_key,
            request_timeout,
            connect_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Connector for RestConnector {
    type Connection = RestSession;
    type Error = StoreError;

    async fn connect(&self) -> StoreResult<RestSession> {
        let http = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(1)
            .user_agent(concat!("docgate-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Network)?;

        Ok(RestSession {
            http,
            base_url: self.base_url.clone(),
            tokens: self.tokens.clone(),
            api_key: self.api_key.clone(),
        })
    }
}

// =============================================================================
// Session
// =============================================================================

/// One pooled HTTP session.
pub struct RestSession {
    http: Client,
    base_url: String,
    tokens: Option<Arc<TokenProvider>>,
    api_key: Option<String>,
}

impl RestSession {
    fn collection_url(&self, collection: &str, action: &str) -> String {
        format!(
            "{}/collections/{}:{}",
            self.base_url,
            urlencoding::encode(collection),
            action
        )
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("UNAUTHENTICATED")
    }

    async fn bearer(&self) -> StoreResult<Option<String>> {
        match &self.tokens {
            Some(tokens) => Ok(Some(tokens.get_token().await?)),
            None => Ok(None),
        }
    }

    /// Send an authorized request, replaying once if the token had expired.
    ///
    /// Any other 401/403 is returned as a rejected credential.
    async fn send<F>(&self, build: F) -> StoreResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let token = self.bearer().await?;
        let mut response = authorize(build(&self.http), token.as_deref(), self.api_key.as_deref())
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            match &self.tokens {
                Some(tokens) if Self::is_access_token_expired(&body) => {
                    debug!("Access token expired, refreshing and replaying request");
                    tokens.invalidate().await;
                    let token = tokens.get_token().await?;
                    response = authorize(build(&self.http), Some(&token), self.api_key.as_deref())
                        .send()
                        .await?;
                }
                _ => return Err(StoreError::from_http_status(401, body)),
            }
        }

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::from_http_status(status, body))
            }
            _ => Ok(response),
        }
    }

    async fn post<B: Serialize + Sync>(&self, url: &str, body: &B) -> StoreResult<Response> {
        self.send(|http| http.post(url).json(body)).await
    }

    async fn execute_request<T, F>(&self, operation: &str, collection: &str, fut: F) -> StoreResult<T>
    where
        F: std::future::Future<Output = StoreResult<T>>,
    {
        let span = info_span!(
            "docgate_request",
            backend = BACKEND,
            operation = %operation,
            collection = %collection
        );

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, BACKEND, status, latency_ms);

        result
    }

    async fn handle_error_response(url: &str, response: Response) -> StoreError {
        let status = response.status().as_u16();
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000));
        let body = response.text().await.unwrap_or_default();
        StoreError::from_http_status_with_retry_after(
            status,
            format!("{} failed: {}", url, body),
            retry_after_ms,
        )
    }

    async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> StoreResult<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::invalid_response(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl DocumentSession for RestSession {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn find(
        &self,
        collection: &str,
        filter: &QueryFilter,
        options: &FindOptions,
    ) -> StoreResult<Page<Document>> {
        let url = self.collection_url(collection, "query");
        let body = QueryRequest {
            filter,
            limit: options.limit,
            page_token: options.page_token.as_deref(),
        };

        self.execute_request("find", collection, async {
            let response = self.post(&url, &body).await?;
            match response.status() {
                s if s.is_success() => {
                    let page: QueryResponse = Self::decode(&url, response).await?;
                    Ok(Page::new(page.documents, page.next_page_token))
                }
                StatusCode::NOT_FOUND => Ok(Page::empty()),
                _ => Err(Self::handle_error_response(&url, response).await),
            }
        })
        .await
    }

    async fn count(&self, collection: &str, filter: &QueryFilter) -> StoreResult<u64> {
        let url = self.collection_url(collection, "count");

        self.execute_request("count", collection, async {
            let response = self.post(&url, &CountRequest { filter }).await?;
            match response.status() {
                s if s.is_success() => Ok(Self::decode::<CountResponse>(&url, response).await?.count),
                StatusCode::NOT_FOUND => Ok(0),
                _ => Err(Self::handle_error_response(&url, response).await),
            }
        })
        .await
    }

    async fn upsert_batch(&self, collection: &str, documents: &[Document]) -> StoreResult<UpsertSummary> {
        let url = self.collection_url(collection, "batchUpsert");

        self.execute_request("upsert", collection, async {
            let response = self.post(&url, &BatchUpsertRequest { documents }).await?;
            if response.status().is_success() {
                Self::decode(&url, response).await
            } else {
                Err(Self::handle_error_response(&url, response).await)
            }
        })
        .await
    }

    async fn delete_many(&self, collection: &str, filter: &QueryFilter, allow_empty: bool) -> StoreResult<u64> {
        if filter.is_empty() && !allow_empty {
            return Err(StoreError::EmptyFilter { operation: "delete" });
        }
        let url = self.collection_url(collection, "deleteMany");

        self.execute_request("delete", collection, async {
            let body = DeleteManyRequest { filter, allow_empty };
            let response = self.post(&url, &body).await?;
            if response.status().is_success() {
                Ok(Self::decode::<DeleteManyResponse>(&url, response).await?.deleted)
            } else {
                Err(Self::handle_error_response(&url, response).await)
            }
        })
        .await
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
        let url = self.collection_url(collection, "updateMany");

        self.execute_request("update", collection, async {
            let body = UpdateManyRequest { filter, set, allow_empty };
            let response = self.post(&url, &body).await?;
            if response.status().is_success() {
                Self::decode(&url, response).await
            } else {
                Err(Self::handle_error_response(&url, response).await)
            }
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        let url = format!("{}/health", self.base_url);

        self.execute_request("ping", "-", async {
            let response = self.send(|http| http.get(&url)).await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::handle_error_response(&url, response).await)
            }
        })
        .await
    }
}
