//! Outbound auth header contract.

use reqwest::RequestBuilder;

/// Header carrying a static API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Attach the bearer token and, when present, the static API key.
pub fn authorize(
    request: RequestBuilder,
    token: Option<&str>,
    api_key: Option<&str>,
) -> RequestBuilder {
    let request = match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    };
    match api_key {
        Some(key) => request.header(API_KEY_HEADER, key),
        None => request,
    }
}
