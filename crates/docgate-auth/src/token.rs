//! Access token with expiry.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::to_chrono;

/// Access token derived from a credential.
///
/// Tokens are replaced wholesale on refresh, never patched.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Usable without refresh: `now + skew` is still before expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now + to_chrono(skew) < self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
