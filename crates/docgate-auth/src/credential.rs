//! Credential material.

use std::fmt;
use std::path::PathBuf;

use crate::error::{AuthError, AuthResult};

/// Secret material used to obtain tokens.
///
/// Loaded once and never mutated. `Debug` never prints secrets.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Static API key, exchanged for a token and also sent as `x-api-key`.
    ApiKey { key: String },
    /// OAuth2 resource owner password grant.
    Password {
        client_id: String,
        client_secret: Option<String>,
        username: String,
        password: String,
    },
    /// OAuth2 client credentials grant.
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
    /// Google service-account JSON file.
    ServiceAccount { path: PathBuf },
}

impl Credential {
    /// Load a credential from environment variables.
    ///
    /// Checked in order: `DOCGATE_API_KEY`, `DOCGATE_USERNAME`/`DOCGATE_PASSWORD`,
    /// `DOCGATE_CLIENT_ID`/`DOCGATE_CLIENT_SECRET`, `GOOGLE_APPLICATION_CREDENTIALS`.
    /// Returns `Ok(None)` when nothing is configured.
    pub fn from_env() -> AuthResult<Option<Self>> {
        if let Some(key) = non_empty_env("DOCGATE_API_KEY") {
            return Ok(Some(Credential::ApiKey { key }));
        }

        let client_id = non_empty_env("DOCGATE_CLIENT_ID");
        let client_secret = non_empty_env("DOCGATE_CLIENT_SECRET");

        match (non_empty_env("DOCGATE_USERNAME"), non_empty_env("DOCGATE_PASSWORD")) {
            (Some(username), Some(password)) => {
                return Ok(Some(Credential::Password {
                    client_id: client_id.unwrap_or_else(|| "docgate".to_string()),
                    client_secret,
                    username,
                    password,
                }));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(AuthError::config(
                    "DOCGATE_USERNAME and DOCGATE_PASSWORD must be set together",
                ));
            }
            (None, None) => {}
        }

        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => {
                return Ok(Some(Credential::ClientCredentials {
                    client_id,
                    client_secret,
                }));
            }
            (Some(_), None) => {
                return Err(AuthError::config(
                    "DOCGATE_CLIENT_SECRET is required with DOCGATE_CLIENT_ID",
                ));
            }
            _ => {}
        }

        Ok(non_empty_env("GOOGLE_APPLICATION_CREDENTIALS")
            .map(|path| Credential::ServiceAccount { path: path.into() }))
    }

    /// Static key to send alongside the bearer token, if any.
    pub fn api_key(&self) -> Option<&str> {
        match self {
            Credential::ApiKey { key } => Some(key),
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::ApiKey { .. } => "api_key",
            Credential::Password { .. } => "password",
            Credential::ClientCredentials { .. } => "client_credentials",
            Credential::ServiceAccount { .. } => "service_account",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey { .. } => f.debug_struct("ApiKey").field("key", &"<redacted>").finish(),
            Credential::Password {
                client_id, username, ..
            } => f
                .debug_struct("Password")
                .field("client_id", client_id)
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credential::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Credential::ServiceAccount { path } => {
                f.debug_struct("ServiceAccount").field("path", path).finish()
            }
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DOCGATE_API_KEY",
        "DOCGATE_USERNAME",
        "DOCGATE_PASSWORD",
        "DOCGATE_CLIENT_ID",
        "DOCGATE_CLIENT_SECRET",
        "GOOGLE_APPLICATION_CREDENTIALS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_none_configured() {
        clear_env();
        assert!(Credential::from_env().unwrap().is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_prefers_api_key() {
        clear_env();
        std::env::set_var("DOCGATE_API_KEY", "k-123");
        std::env::set_var("DOCGATE_USERNAME", "ana");
        std::env::set_var("DOCGATE_PASSWORD", "pw");
        let cred = Credential::from_env().unwrap().unwrap();
        assert_eq!(cred.api_key(), Some("k-123"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_password_requires_both_parts() {
        clear_env();
        std::env::set_var("DOCGATE_USERNAME", "ana");
        assert!(Credential::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_client_credentials() {
        clear_env();
        std::env::set_var("DOCGATE_CLIENT_ID", "svc");
        std::env::set_var("DOCGATE_CLIENT_SECRET", "s3cret");
        let cred = Credential::from_env().unwrap().unwrap();
        assert_eq!(cred.kind(), "client_credentials");
        assert_eq!(cred.api_key(), None);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_service_account() {
        clear_env();
        std::env::set_var("GOOGLE_APPLICATION_CREDENTIALS", "/etc/sa.json");
        let cred = Credential::from_env().unwrap().unwrap();
        assert_eq!(
            cred,
            Credential::ServiceAccount {
                path: "/etc/sa.json".into()
            }
        );
        clear_env();
    }

    #[test]
    fn test_debug_hides_secrets() {
        let cred = Credential::Password {
            client_id: "cli".into(),
            client_secret: Some("cs".into()),
            username: "ana".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{:?}", cred);
        assert!(printed.contains("ana"));
        assert!(!printed.contains("hunter2"));
        assert!(!format!("{:?}", Credential::ApiKey { key: "k-1".into() }).contains("k-1"));
    }
}
