//! Configuration for a backend
//!
//! Supports environment-based configuration with sensible defaults. Each
//! backend reads its own variables under a prefix, e.g. `RECOMMENDATIONS_URL`.

use crate::connection::DEFAULT_MAX_AGE;
use crate::error::{BackendError, BackendResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default user agent sent by every backend
const DEFAULT_USER_AGENT: &str = concat!("appnexus-api-client/", env!("CARGO_PKG_VERSION"));

/// Default endpoint probed by `connect`
const DEFAULT_CONNECT_ENDPOINT: &str = "/status";

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend
    pub base_url: String,
    /// Path segment inserted between the base URL and every request path
    pub url_prefix: String,
    /// Endpoint probed by `connect`
    pub connect_endpoint: String,
    /// Overall request timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Connect timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Idle age after which the HTTP session is replaced
    #[serde(with = "duration_secs")]
    pub max_connection_age: Duration,
    /// User agent header
    pub user_agent: String,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            url_prefix: String::new(),
            connect_endpoint: DEFAULT_CONNECT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_connection_age: DEFAULT_MAX_AGE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl BackendConfig {
    /// Create a configuration for `base_url` with defaults elsewhere
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Create configuration from environment variables
    ///
    /// Reads the following variables, where `PREFIX` is `prefix` upper-cased:
    /// - `PREFIX_URL`: Base URL (required)
    /// - `PREFIX_URL_PREFIX`: Path prefix
    /// - `PREFIX_CONNECT_ENDPOINT`: Endpoint probed by `connect`
    /// - `PREFIX_TIMEOUT_SECS`: Request timeout in seconds
    /// - `PREFIX_CONNECT_TIMEOUT_SECS`: Connect timeout in seconds
    /// - `PREFIX_MAX_CONNECTION_AGE_SECS`: Session idle age in seconds
    pub fn from_env(prefix: &str) -> BackendResult<Self> {
        Self::from_lookup(prefix, |key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source
    pub fn from_lookup<L>(prefix: &str, lookup: L) -> BackendResult<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let prefix = prefix.to_uppercase();
        let var = |name: &str| lookup(format!("{prefix}_{name}").as_str());
        let secs = |name: &str| {
            var(name)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        let base_url = var("URL").ok_or_else(|| {
            BackendError::invalid_request("", format!("missing environment variable {prefix}_URL"))
        })?;

        let defaults = Self::default();
        let config = Self {
            base_url,
            url_prefix: var("URL_PREFIX").unwrap_or_default(),
            connect_endpoint: var("CONNECT_ENDPOINT").unwrap_or(defaults.connect_endpoint),
            timeout: secs("TIMEOUT_SECS").unwrap_or(defaults.timeout),
            connect_timeout: secs("CONNECT_TIMEOUT_SECS").unwrap_or(defaults.connect_timeout),
            max_connection_age: secs("MAX_CONNECTION_AGE_SECS")
                .unwrap_or(defaults.max_connection_age),
            user_agent: defaults.user_agent,
        };

        config.validate()?;
        Ok(config)
    }

    /// Builder-style method to set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Builder-style method to set URL prefix
    #[must_use]
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    /// Builder-style method to set connect endpoint
    #[must_use]
    pub fn with_connect_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.connect_endpoint = endpoint.into();
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder-style method to set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder-style method to set the session idle age
    #[must_use]
    pub fn with_max_connection_age(mut self, age: Duration) -> Self {
        self.max_connection_age = age;
        self
    }

    /// Builder-style method to set user agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> BackendResult<()> {
        if self.base_url.is_empty() {
            return Err(BackendError::invalid_request("", "base_url cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(BackendError::invalid_request(
                &self.base_url,
                "base_url must start with http:// or https://",
            ));
        }

        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(BackendError::invalid_request(
                &self.base_url,
                "timeouts cannot be zero",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = BackendConfig::default();
        assert_eq!(config.connect_endpoint, "/status");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_connection_age, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("appnexus-api-client/"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = BackendConfig::new("https://api.example.com")
            .with_url_prefix("v1")
            .with_timeout(Duration::from_secs(60))
            .with_max_connection_age(Duration::from_secs(5));

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.url_prefix, "v1");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_connection_age, Duration::from_secs(5));
    }

    #[test]
    fn test_validation() {
        assert!(BackendConfig::new("https://api.example.com").validate().is_ok());

        let empty = BackendConfig::default().validate().unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::InvalidRequest);

        let scheme = BackendConfig::new("ftp://api.example.com").validate().unwrap_err();
        assert_eq!(scheme.kind(), ErrorKind::InvalidRequest);

        let zero = BackendConfig::new("https://api.example.com")
            .with_timeout(Duration::ZERO)
            .validate();
        assert!(zero.is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = BackendConfig::from_lookup(
            "recommendations",
            lookup(&[
                ("RECOMMENDATIONS_URL", "http://localhost:8000"),
                ("RECOMMENDATIONS_URL_PREFIX", "/api/v2/"),
                ("RECOMMENDATIONS_TIMEOUT_SECS", "5"),
                ("RECOMMENDATIONS_MAX_CONNECTION_AGE_SECS", "not-a-number"),
            ]),
        )
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.url_prefix, "/api/v2/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_connection_age, DEFAULT_MAX_AGE);
        assert_eq!(config.connect_endpoint, "/status");
    }

    #[test]
    fn test_from_lookup_requires_url() {
        let err = BackendConfig::from_lookup("missing", lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("MISSING_URL"));
    }

    #[test]
    fn test_serde_durations_as_seconds() {
        let config = BackendConfig::new("https://api.example.com");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["timeout"], 30);

        let back: BackendConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.max_connection_age, Duration::from_secs(10));
    }
}
