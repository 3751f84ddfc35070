//! Store client configuration.

use std::str::FromStr;
use std::time::Duration;

use docgate_auth::{Credential, IdentityConfig, TokenProviderConfig};
use docgate_pool::PoolConfig;

use crate::error::{StoreError, StoreResult};
use crate::retry::RetryConfig;

/// Default number of documents per upsert request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

/// Which backend the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Rest,
    Memory,
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" | "http" => Ok(BackendKind::Rest),
            "memory" | "mem" => Ok(BackendKind::Memory),
            other => Err(StoreError::config(format!("unknown backend: {}", other))),
        }
    }
}

/// Store client configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Base URL of the REST store
    pub endpoint: Option<String>,
    /// Credential used to obtain tokens; `None` sends unauthenticated requests
    pub credential: Option<Credential>,
    pub identity: IdentityConfig,
    /// Refresh skew and timeout
    pub token: TokenProviderConfig,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Documents per upsert request
    pub max_batch_size: usize,
    /// Policy for `DocGateClient::with_retry`
    pub retry: RetryConfig,
    pub pool: PoolConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Rest,
            endpoint: None,
            credential: None,
            identity: IdentityConfig::default(),
            token: TokenProviderConfig::default(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            retry: RetryConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

impl StoreConfig {
    /// In-memory backend with default settings.
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Self::default()
        }
    }

    /// REST backend at `endpoint`.
    pub fn rest(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set the token refresh skew.
    pub fn with_token_skew(mut self, skew: Duration) -> Self {
        self.token.skew = skew;
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let backend = match std::env::var("DOCGATE_BACKEND") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => BackendKind::Rest,
        };

        let request_timeout_secs: u64 = std::env::var("DOCGATE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let connect_timeout_secs: u64 = std::env::var("DOCGATE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let config = Self {
            backend,
            endpoint: std::env::var("DOCGATE_ENDPOINT").ok().filter(|s| !s.is_empty()),
            credential: Credential::from_env()?,
            identity: IdentityConfig::from_env(),
            token: TokenProviderConfig::from_env(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            max_batch_size: std::env::var("DOCGATE_MAX_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_BATCH_SIZE),
            retry: RetryConfig::from_env(),
            pool: PoolConfig::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.max_batch_size == 0 {
            return Err(StoreError::config("max_batch_size must be at least 1"));
        }
        self.pool.validate()?;

        if self.backend == BackendKind::Rest {
            let endpoint = self
                .endpoint
                .as_deref()
                .ok_or_else(|| StoreError::config("DOCGATE_ENDPOINT must be set for the rest backend"))?;
            url::Url::parse(endpoint)
                .map_err(|e| StoreError::config(format!("invalid endpoint {}: {}", endpoint, e)))?;
        }
        Ok(())
    }
}
