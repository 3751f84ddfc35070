//! Google service-account token source.

use std::path::Path;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider as _};
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::source::TokenSource;
use crate::token::Token;

/// Mints tokens from a service-account JSON key.
pub struct ServiceAccountSource {
    account: CustomServiceAccount,
    scopes: Vec<String>,
}

impl ServiceAccountSource {
    /// Load the service account key from a file.
    pub fn from_file(path: impl AsRef<Path>, scopes: Vec<String>) -> AuthResult<Self> {
        let path = path.as_ref();
        let account = CustomServiceAccount::from_file(path).map_err(|e| {
            AuthError::config(format!(
                "Failed to load service account {}: {}",
                path.display(),
                e
            ))
        })?;

        if scopes.is_empty() {
            return Err(AuthError::config("at least one scope is required"));
        }

        Ok(Self { account, scopes })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountSource {
    async fn fetch_token(&self) -> AuthResult<Token> {
        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        let token = self.account.token(&scopes).await.map_err(|e| AuthError::Transient {
            message: format!("service account token exchange failed: {}", e),
            source: Some(Box::new(e)),
        })?;

        debug!(expires_at = %token.expires_at(), "Obtained service account token");
        Ok(Token::new(token.as_str(), token.expires_at()))
    }

    fn name(&self) -> &'static str {
        "service_account"
    }
}
