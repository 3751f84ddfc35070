//! Token provider with refresh skew and single-flight refresh.
//!
//! - Refresh skew keeps tokens from expiring mid-request
//! - Concurrent callers share one refresh instead of stampeding upstream
//! - A refresh that hangs is bounded by a timeout

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, AuthResult};
use crate::source::TokenSource;
use crate::token::Token;

// =============================================================================
// Configuration
// =============================================================================

/// Refresh tuning.
#[derive(Debug, Clone)]
pub struct TokenProviderConfig {
    /// Refresh when `now + skew >= expiry`
    pub skew: Duration,
    /// Upper bound on a single upstream refresh
    pub refresh_timeout: Duration,
}

impl Default for TokenProviderConfig {
    fn default() -> Self {
        Self {
            skew: Duration::from_secs(60),
            refresh_timeout: Duration::from_secs(10),
        }
    }
}

impl TokenProviderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            skew: std::env::var("DOCGATE_TOKEN_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.skew),
            refresh_timeout: std::env::var("DOCGATE_TOKEN_REFRESH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_timeout),
        }
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Owns a credential's token source and hands out fresh tokens.
pub struct TokenProvider {
    source: Arc<dyn TokenSource>,
    config: TokenProviderConfig,
    clock: Arc<dyn Clock>,
    cache: RwLock<Option<Token>>,
}

impl TokenProvider {
    pub fn new(source: Arc<dyn TokenSource>, config: TokenProviderConfig) -> Self {
        Self {
            source,
            config,
            clock: Arc::new(SystemClock),
            cache: RwLock::new(None),
        }
    }

    /// Use a custom clock, e.g. a `ManualClock` for simulated time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TokenProviderConfig {
        &self.config
    }

    /// Drop the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }

    /// Get the bearer value of a fresh token.
    pub async fn get_token(&self) -> AuthResult<String> {
        Ok(self.token().await?.as_str().to_string())
    }

    /// Get a fresh token, refreshing if it is within the skew of expiry.
    pub async fn token(&self) -> AuthResult<Token> {
        // Fast path
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.as_ref() {
                if token.is_fresh(self.clock.now(), self.config.skew) {
                    return Ok(token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited
        if let Some(token) = cache.as_ref() {
            if token.is_fresh(self.clock.now(), self.config.skew) {
                return Ok(token.clone());
            }
        }

        // A stale token is never handed out, even if refresh fails.
        *cache = None;
        let token = self.refresh().await?;
        *cache = Some(token.clone());
        Ok(token)
    }

    async fn refresh(&self) -> AuthResult<Token> {
        let source = self.source.name();
        let result = tokio::time::timeout(self.config.refresh_timeout, self.source.fetch_token())
            .await
            .unwrap_or_else(|_| Err(AuthError::Timeout(self.config.refresh_timeout)));

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) if e.is_retryable() => "transient",
            Err(_) => "rejected",
        };
        metrics::counter!(
            "docgate_token_refreshes_total",
            "source" => source,
            "outcome" => outcome
        )
        .increment(1);

        let token = match result {
            Ok(token) => token,
            Err(e) => {
                warn!(source, error = %e, "Token refresh failed");
                return Err(e);
            }
        };

        let now = self.clock.now();
        if token.is_expired(now) {
            return Err(AuthError::transient(format!(
                "{} issued a token that expired at {}",
                source,
                token.expires_at()
            )));
        }
        if !token.is_fresh(now, self.config.skew) {
            warn!(
                source,
                expires_at = %token.expires_at(),
                "Issued token lifetime is shorter than refresh skew"
            );
        }

        debug!(source, expires_at = %token.expires_at(), "Refreshed auth token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::clock::{to_chrono, ManualClock};

    /// Issues tokens valid for `ttl` from the shared clock.
    struct FakeSource {
        clock: Arc<ManualClock>,
        ttl: Duration,
        calls: AtomicUsize,
        delay: Duration,
        fail_with: Option<fn() -> AuthError>,
    }

    impl FakeSource {
        fn new(clock: Arc<ManualClock>, ttl: Duration) -> Self {
            Self {
                clock,
                ttl,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail_with: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenSource for FakeSource {
        async fn fetch_token(&self) -> AuthResult<Token> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(Token::new(
                format!("tok-{}", n),
                self.clock.now() + to_chrono(self.ttl),
            ))
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn setup(ttl: Duration) -> (Arc<ManualClock>, Arc<FakeSource>, TokenProvider) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let source = Arc::new(FakeSource::new(clock.clone(), ttl));
        let provider = TokenProvider::new(source.clone(), TokenProviderConfig::default())
            .with_clock(clock.clone());
        (clock, source, provider)
    }

    #[tokio::test]
    async fn test_token_reused_until_skew() {
        let (clock, source, provider) = setup(Duration::from_secs(3600));

        assert_eq!(provider.get_token().await.unwrap(), "tok-1");
        clock.advance(Duration::from_secs(3539));
        assert_eq!(provider.get_token().await.unwrap(), "tok-1");
        assert_eq!(source.calls(), 1);

        // 3540s + 60s skew reaches expiry
        clock.advance(Duration::from_secs(1));
        assert_eq!(provider.get_token().await.unwrap(), "tok-2");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_simulated_expiry_triggers_exactly_one_refresh() {
        let (clock, source, provider) = setup(Duration::from_secs(3600));
        provider.get_token().await.unwrap();
        let before = source.calls();

        clock.advance(Duration::from_secs(3601));
        let token = provider.token().await.unwrap();

        assert_eq!(source.calls() - before, 1);
        assert!(token.expires_at() > clock.now());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut source = FakeSource::new(clock.clone(), Duration::from_secs(3600));
        source.delay = Duration::from_millis(50);
        let source = Arc::new(source);
        let provider = Arc::new(
            TokenProvider::new(source.clone(), TokenProviderConfig::default()).with_clock(clock),
        );

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.get_token().await.unwrap() })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "tok-1");
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let (_clock, source, provider) = setup(Duration::from_secs(3600));
        provider.get_token().await.unwrap();
        provider.invalidate().await;
        assert_eq!(provider.get_token().await.unwrap(), "tok-2");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_already_expired_token_is_error() {
        let (_clock, _source, provider) = setup(Duration::ZERO);
        let err = provider.get_token().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_rejected_credential_surfaces() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut source = FakeSource::new(clock.clone(), Duration::from_secs(3600));
        source.fail_with = Some(|| AuthError::rejected("bad password"));
        let provider =
            TokenProvider::new(Arc::new(source), TokenProviderConfig::default()).with_clock(clock);

        let err = provider.get_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_refresh_timeout() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut source = FakeSource::new(clock.clone(), Duration::from_secs(3600));
        source.delay = Duration::from_secs(5);
        let config = TokenProviderConfig {
            refresh_timeout: Duration::from_millis(50),
            ..TokenProviderConfig::default()
        };
        let provider = TokenProvider::new(Arc::new(source), config).with_clock(clock);

        let err = provider.get_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_failed_refresh_never_returns_stale_token() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let source = Arc::new(FakeSource::new(clock.clone(), Duration::from_secs(3600)));
        let provider =
            TokenProvider::new(source, TokenProviderConfig::default()).with_clock(clock.clone());
        provider.get_token().await.unwrap();

        // Swap in a failing source by building a provider that shares nothing but the clock
        let mut failing = FakeSource::new(clock.clone(), Duration::from_secs(3600));
        failing.fail_with = Some(|| AuthError::transient("503"));
        let provider = TokenProvider {
            source: Arc::new(failing),
            ..provider
        };

        clock.advance(Duration::from_secs(3550));
        assert!(provider.get_token().await.is_err());
    }
}
