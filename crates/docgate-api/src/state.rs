//! Application state.

use std::sync::Arc;

use docgate_store::DocGateClient;

use crate::config::ApiConfig;
use crate::middleware::{create_rate_limiter, GlobalRateLimiter};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub store: DocGateClient,
    pub rate_limiter: Arc<GlobalRateLimiter>,
}

impl AppState {
    /// Create state over a store client configured from the environment.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store = DocGateClient::from_env().await?;
        store.login().await?;
        Ok(Self::with_store(config, store))
    }

    /// Create state over an already opened store client.
    pub fn with_store(config: ApiConfig, store: DocGateClient) -> Self {
        let rate_limiter = create_rate_limiter(config.rate_limit_rps);
        Self {
            config: Arc::new(config),
            store,
            rate_limiter,
        }
    }
}
