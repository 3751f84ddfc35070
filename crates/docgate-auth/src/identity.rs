//! OAuth2-style identity endpoint client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::clock::{to_chrono, Clock, SystemClock};
use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};
use crate::source::TokenSource;
use crate::token::Token;

/// Conservative token TTL when the endpoint does not report `expires_in`.
pub const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// Default scope requested for service-account credentials.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

// =============================================================================
// Configuration
// =============================================================================

/// Identity endpoint configuration.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Token endpoint URL
    pub token_url: Option<String>,
    /// Audience requested for issued tokens
    pub audience: Option<String>,
    /// Requested token lifetime
    pub duration: Option<Duration>,
    /// Scopes for service-account credentials
    pub scopes: Vec<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            token_url: None,
            audience: None,
            duration: None,
            scopes: vec![DEFAULT_SCOPE.to_string()],
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl IdentityConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token_url: std::env::var("DOCGATE_TOKEN_URL").ok().filter(|s| !s.is_empty()),
            audience: std::env::var("DOCGATE_AUDIENCE").ok().filter(|s| !s.is_empty()),
            duration: std::env::var("DOCGATE_TOKEN_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            scopes: std::env::var("DOCGATE_SCOPES")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(defaults.scopes),
            request_timeout: std::env::var("DOCGATE_TOKEN_REFRESH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges a credential for a token at the identity endpoint.
pub struct IdentityClient {
    http: Client,
    token_url: String,
    credential: Credential,
    config: IdentityConfig,
    clock: Arc<dyn Clock>,
}

impl IdentityClient {
    /// Create a client for a non service-account credential.
    pub fn new(credential: Credential, config: IdentityConfig) -> AuthResult<Self> {
        if matches!(credential, Credential::ServiceAccount { .. }) {
            return Err(AuthError::config(
                "service-account credentials are exchanged through ServiceAccountSource",
            ));
        }

        let token_url = config
            .token_url
            .clone()
            .ok_or_else(|| AuthError::config("DOCGATE_TOKEN_URL must be set for this credential"))?;
        url::Url::parse(&token_url)
            .map_err(|e| AuthError::config(format!("invalid token URL {}: {}", token_url, e)))?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("docgate-auth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_url,
            credential,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Use a custom clock for computing expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn form_params(&self) -> Vec<(&'static str, String)> {
        let mut params = match &self.credential {
            Credential::ApiKey { key } => vec![
                ("grant_type", "api_key".to_string()),
                ("api_key", key.clone()),
            ],
            Credential::Password {
                client_id,
                client_secret,
                username,
                password,
            } => {
                let mut p = vec![
                    ("grant_type", "password".to_string()),
                    ("client_id", client_id.clone()),
                    ("username", username.clone()),
                    ("password", password.clone()),
                ];
                if let Some(secret) = client_secret {
                    p.push(("client_secret", secret.clone()));
                }
                p
            }
            Credential::ClientCredentials {
                client_id,
                client_secret,
            } => vec![
                ("grant_type", "client_credentials".to_string()),
                ("client_id", client_id.clone()),
                ("client_secret", client_secret.clone()),
            ],
            Credential::ServiceAccount { .. } => Vec::new(),
        };

        if let Some(audience) = &self.config.audience {
            params.push(("audience", audience.clone()));
        }
        if let Some(duration) = self.config.duration {
            params.push(("duration", duration.as_secs().to_string()));
        }
        params
    }
}

#[async_trait]
impl TokenSource for IdentityClient {
    async fn fetch_token(&self) -> AuthResult<Token> {
        debug!(
            credential = self.credential.kind(),
            url = %self.token_url,
            "Requesting token from identity endpoint"
        );

        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&self.form_params())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let body: TokenResponse = response.json().await?;
        if body.access_token.is_empty() {
            return Err(AuthError::transient("identity endpoint returned an empty access_token"));
        }

        let ttl = match body.expires_in {
            Some(secs) => Duration::from_secs(secs),
            None => {
                warn!("Identity response has no expires_in, assuming {:?}", TOKEN_DEFAULT_TTL);
                TOKEN_DEFAULT_TTL
            }
        };

        Ok(Token::new(body.access_token, self.clock.now() + to_chrono(ttl)))
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Map a non-success identity response onto the error taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> AuthError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let detail = match (parsed.error, parsed.error_description) {
        (Some(code), Some(desc)) => format!("{}: {}", code, desc),
        (Some(code), None) => code,
        (None, Some(desc)) => desc,
        (None, None) => body.chars().take(200).collect(),
    };

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AuthError::rejected(format!("{} ({})", detail, status.as_u16()))
        }
        s if s == StatusCode::REQUEST_TIMEOUT
            || s == StatusCode::TOO_MANY_REQUESTS
            || s.is_server_error() =>
        {
            AuthError::transient(format!("identity endpoint returned {}: {}", s.as_u16(), detail))
        }
        s => AuthError::rejected(format!("unexpected identity response {}: {}", s.as_u16(), detail)),
    }
}
