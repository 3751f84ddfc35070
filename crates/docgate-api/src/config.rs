//! API configuration.

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Accepted inbound `x-api-key` values. Empty disables the check.
    pub api_keys: Vec<String>,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Global rate limit, requests per second
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Serve Prometheus metrics at `/metrics`
    pub metrics_enabled: bool,
    /// Emit JSON logs instead of the human format
    pub json_logs: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            api_keys: Vec::new(),
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 100,
            max_body_size: 5 * 1024 * 1024, // 5MB
            environment: "development".to_string(),
            metrics_enabled: true,
            json_logs: false,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: parse_env("API_PORT").unwrap_or(defaults.port),
            api_keys: std::env::var("API_KEYS")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: parse_env("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            max_body_size: parse_env("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            json_logs: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(defaults.json_logs),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn requires_api_key(&self) -> bool {
        !self.api_keys.is_empty()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "API_HOST",
        "API_PORT",
        "API_KEYS",
        "CORS_ORIGINS",
        "RATE_LIMIT_RPS",
        "MAX_BODY_SIZE",
        "ENVIRONMENT",
        "METRICS_ENABLED",
        "LOG_FORMAT",
    ];

    fn clear() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear();
        let config = ApiConfig::from_env();
        assert_eq!(config.port, 8080);
        assert!(!config.requires_api_key());
        assert_eq!(config.cors_origins, vec!["*"]);
        assert!(config.metrics_enabled);
        assert!(!config.is_production());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear();
        std::env::set_var("API_PORT", "9000");
        std::env::set_var("API_KEYS", "k1, k2,");
        std::env::set_var("RATE_LIMIT_RPS", "not-a-number");
        std::env::set_var("ENVIRONMENT", "Production");
        std::env::set_var("METRICS_ENABLED", "false");
        std::env::set_var("LOG_FORMAT", "JSON");

        let config = ApiConfig::from_env();
        assert_eq!(config.port, 9000);
        assert_eq!(config.api_keys, vec!["k1", "k2"]);
        assert_eq!(config.rate_limit_rps, 100);
        assert!(config.is_production());
        assert!(!config.metrics_enabled);
        assert!(config.json_logs);
        clear();
    }
}
