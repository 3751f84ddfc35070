//! Upstream token sources.

use async_trait::async_trait;

use crate::error::AuthResult;
use crate::token::Token;

/// Something that can mint a fresh token from a held credential.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a new token from upstream.
    async fn fetch_token(&self) -> AuthResult<Token>;

    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;
}
