//! Pool configuration.

use std::time::Duration;

use crate::error::{PoolError, PoolResult};

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connections opened eagerly by `Pool::open`
    pub min_connections: usize,
    /// Hard cap on concurrently leased connections
    pub max_connections: usize,
    /// Default wait for a free slot
    pub acquire_timeout: Duration,
    /// Connections older than this are closed instead of reused
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 0,
            max_connections: 10,
            acquire_timeout: Duration::from_millis(5000),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

impl PoolConfig {
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Create config from environment variables.
    ///
    /// `DOCGATE_POOL_MAX_LIFETIME_SECS=0` disables lifetime recycling.
    pub fn from_env() -> PoolResult<Self> {
        let defaults = Self::default();

        let config = Self {
            min_connections: env_parse("DOCGATE_POOL_MIN")?.unwrap_or(defaults.min_connections),
            max_connections: env_parse("DOCGATE_POOL_MAX")?.unwrap_or(defaults.max_connections),
            acquire_timeout: env_parse("DOCGATE_POOL_ACQUIRE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.acquire_timeout),
            max_lifetime: match env_parse::<u64>("DOCGATE_POOL_MAX_LIFETIME_SECS")? {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.max_lifetime,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.max_connections == 0 {
            return Err(PoolError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(PoolError::InvalidConfig(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> PoolResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PoolError::InvalidConfig(format!("{} is not a valid number: {}", name, raw))),
        _ => Ok(None),
    }
}
