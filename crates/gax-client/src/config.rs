//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client starts against the mock backend
//! with zero configuration.

use std::path::PathBuf;
use std::time::Duration;

use gax_shared::constants::{DEFAULT_API_URL, DEFAULT_MOCK_LATENCY_MS, DEFAULT_REQUEST_TIMEOUT_MS};

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the api gateway.
    /// Env: `GAX_API_URL`
    /// Default: `http://localhost:8080`
    pub api_url: String,

    /// Answer every request locally instead of calling the backend.
    /// Env: `GAX_MOCK` (true/false)
    /// Default: `true`
    pub mock: bool,

    /// Env: `GAX_REQUEST_TIMEOUT_MS`
    /// Default: `10000`
    pub request_timeout: Duration,

    /// Artificial delay of every mock response.
    /// Env: `GAX_MOCK_LATENCY_MS`
    /// Default: `100`
    pub mock_latency: Duration,

    /// Directory holding the SQLite storage file.
    /// Env: `GAX_DATA_DIR`
    /// Default: platform data directory.
    pub data_dir: Option<PathBuf>,

    /// WebSocket endpoint for server push. Push is off when unset.
    /// Env: `GAX_PUSH_URL`
    pub push_url: Option<String>,

    /// Largest accepted persisted value, in bytes.
    /// Env: `GAX_STORAGE_QUOTA_BYTES` (0 = unlimited)
    /// Default: unlimited.
    pub storage_quota: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            mock: true,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            mock_latency: Duration::from_millis(DEFAULT_MOCK_LATENCY_MS),
            data_dir: None,
            push_url: None,
            storage_quota: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("GAX_API_URL") {
            if url.trim().is_empty() {
                tracing::warn!("Empty GAX_API_URL, using default");
            } else {
                config.api_url = url.trim().to_string();
            }
        }

        if let Some(val) = lookup("GAX_MOCK") {
            config.mock = val != "false" && val != "0";
        }

        if let Some(val) = lookup("GAX_REQUEST_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => config.request_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(value = %val, "Invalid GAX_REQUEST_TIMEOUT_MS, using default"),
            }
        }

        if let Some(val) = lookup("GAX_MOCK_LATENCY_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.mock_latency = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %val, "Invalid GAX_MOCK_LATENCY_MS, using default"),
            }
        }

        if let Some(dir) = lookup("GAX_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(url) = lookup("GAX_PUSH_URL") {
            if !url.is_empty() {
                config.push_url = Some(url);
            }
        }

        if let Some(val) = lookup("GAX_STORAGE_QUOTA_BYTES") {
            match val.parse::<usize>() {
                Ok(0) => config.storage_quota = None,
                Ok(n) => config.storage_quota = Some(n),
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid GAX_STORAGE_QUOTA_BYTES, using default")
                }
            }
        }

        // RUST_LOG is read by tracing-subscriber directly.

        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.mock);
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.storage_quota, None);
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(load(&[]), ClientConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("GAX_API_URL", "https://api.example.com"),
            ("GAX_MOCK", "false"),
            ("GAX_REQUEST_TIMEOUT_MS", "2500"),
            ("GAX_MOCK_LATENCY_MS", "0"),
            ("GAX_DATA_DIR", "/tmp/gax"),
            ("GAX_PUSH_URL", "wss://api.example.com/ws"),
            ("GAX_STORAGE_QUOTA_BYTES", "4096"),
        ]);
        assert_eq!(config.api_url, "https://api.example.com");
        assert!(!config.mock);
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.mock_latency, Duration::ZERO);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/gax")));
        assert_eq!(config.push_url.as_deref(), Some("wss://api.example.com/ws"));
        assert_eq!(config.storage_quota, Some(4096));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = load(&[
            ("GAX_REQUEST_TIMEOUT_MS", "soon"),
            ("GAX_MOCK_LATENCY_MS", "-5"),
            ("GAX_STORAGE_QUOTA_BYTES", "lots"),
            ("GAX_API_URL", "  "),
        ]);
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = load(&[("GAX_REQUEST_TIMEOUT_MS", "0")]);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_quota_means_unlimited() {
        assert_eq!(load(&[("GAX_STORAGE_QUOTA_BYTES", "0")]).storage_quota, None);
    }
}
