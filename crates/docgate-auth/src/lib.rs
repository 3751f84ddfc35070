//! Credential handling for docgate.
//!
//! This crate provides:
//! - Credential loading (API key, OAuth2 password/client credentials, service accounts)
//! - Token sources for the identity endpoint and Google service accounts
//! - A token provider with refresh skew and single-flight refresh
//! - The outbound auth header contract

pub mod clock;
pub mod credential;
pub mod error;
pub mod headers;
pub mod identity;
pub mod provider;
pub mod service_account;
pub mod source;
pub mod token;

use std::sync::Arc;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::Credential;
pub use error::{AuthError, AuthResult};
pub use headers::{authorize, API_KEY_HEADER};
pub use identity::{IdentityClient, IdentityConfig};
pub use provider::{TokenProvider, TokenProviderConfig};
pub use service_account::ServiceAccountSource;
pub use source::TokenSource;
pub use token::Token;

/// Build the token source matching a credential.
pub fn token_source(
    credential: &Credential,
    identity: IdentityConfig,
) -> AuthResult<Arc<dyn TokenSource>> {
    match credential {
        Credential::ServiceAccount { path } => Ok(Arc::new(ServiceAccountSource::from_file(
            path,
            identity.scopes.clone(),
        )?)),
        other => Ok(Arc::new(IdentityClient::new(other.clone(), identity)?)),
    }
}
