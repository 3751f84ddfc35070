//! Store client lifecycle.
//!
//! The client owns the connection pool and the token provider. It is created
//! from an explicit config and closed explicitly; clones share one pool.

use std::sync::Arc;

use docgate_auth::{token_source, TokenProvider};
use docgate_models::{NaturalKey, Record};
use docgate_pool::{Pool, PoolStatus};
use tracing::{info, warn};

use crate::backend::StoreConnector;
use crate::config::{BackendKind, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::memory::{MemoryConnector, MemoryStore};
use crate::repository::DocumentRepository;
use crate::rest::RestConnector;
use crate::retry::with_retry;
use crate::session::DocumentSession;
use crate::typed::TypedRepository;

/// Pooled, credentialed document store client.
#[derive(Clone)]
pub struct DocGateClient {
    pool: Pool<StoreConnector>,
    tokens: Option<Arc<TokenProvider>>,
    config: Arc<StoreConfig>,
}

impl DocGateClient {
    /// Build the backend named by the config and open the pool.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;

        let tokens = match &config.credential {
            Some(credential) if config.backend == BackendKind::Rest => {
                let source = token_source(credential, config.identity.clone())?;
                Some(Arc::new(TokenProvider::new(source, config.token.clone())))
            }
            _ => None,
        };

        let connector = match config.backend {
            BackendKind::Rest => {
                let endpoint = config
                    .endpoint
                    .as_deref()
                    .ok_or_else(|| StoreError::config("endpoint is required for the rest backend"))?;
                StoreConnector::Rest(RestConnector::new(
                    endpoint,
                    tokens.clone(),
                    config.credential.as_ref().and_then(|c| c.api_key()).map(String::from),
                    config.request_timeout,
                    config.connect_timeout,
                )?)
            }
            BackendKind::Memory => StoreConnector::Memory(MemoryConnector::new(MemoryStore::new())),
        };

        Self::with_connector(connector, tokens, config).await
    }

    /// Open a client over an already built connector.
    pub async fn with_connector(
        connector: impl Into<StoreConnector>,
        tokens: Option<Arc<TokenProvider>>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let connector = connector.into();
        let backend = connector.backend();
        let pool = Pool::open(connector, config.pool.clone()).await?;

        info!(
            backend,
            max_connections = config.pool.max_connections,
            authenticated = tokens.is_some(),
            "Opened docgate client"
        );

        Ok(Self {
            pool,
            tokens,
            config: Arc::new(config),
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StoreResult<Self> {
        let config = StoreConfig::from_env()?;
        Self::open(config).await
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn token_provider(&self) -> Option<&Arc<TokenProvider>> {
        self.tokens.as_ref()
    }

    /// Fetch a token now instead of on first request.
    pub async fn login(&self) -> StoreResult<()> {
        if let Some(tokens) = &self.tokens {
            tokens.token().await?;
        }
        Ok(())
    }

    /// Repository for a collection keyed by `key_fields`.
    pub fn repository<I, S>(&self, collection: &str, key_fields: I) -> DocumentRepository
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DocumentRepository::new(
            self.pool.clone(),
            collection,
            NaturalKey::new(key_fields),
            self.config.max_batch_size,
        )
    }

    /// Repository for a typed record's collection.
    pub fn typed<T: Record>(&self) -> TypedRepository<T> {
        TypedRepository::new(DocumentRepository::new(
            self.pool.clone(),
            T::COLLECTION,
            T::natural_key(),
            self.config.max_batch_size,
        ))
    }

    /// Check the backend is reachable.
    pub async fn ping(&self) -> StoreResult<()> {
        let session = self.pool.acquire().await?;
        let result = session.ping().await;
        if matches!(&result, Err(e) if e.is_transport()) {
            session.discard();
        }
        result
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Run `op` with the configured retry policy.
    pub async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        with_retry(&self.config.retry, operation, op).await
    }

    /// Close the pool. Later calls fail with a closed-pool error.
    pub fn close(&self) {
        if self.pool.is_closed() {
            warn!("docgate client already closed");
            return;
        }
        self.pool.close_all();
        info!("Closed docgate client");
    }
}
