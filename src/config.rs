//! Configuration file loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. `huginn --config <path>`)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! Every section is optional; omitted values take the built-in defaults.
//!
//! ```toml
//! [cache]
//! freshness_secs = 300
//! sweep_threshold = 100
//!
//! [dispatch]
//! debounce_ms = 100
//! throttle_ms = 1000
//! max_concurrent = 6
//!
//! [transport]
//! base_url = "https://api.example.com"
//! timeout_secs = 30
//!
//! [[policy]]
//! pattern = "/rooms/*"
//! strategy = "cached"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::orchestrator::PolicyRule;
use crate::{HuginnError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub policy: Vec<PolicyRule>,
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    /// Freshness window in seconds (default: 300).
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
    /// Entry count that triggers an expiry sweep (default: 100).
    #[serde(default = "default_sweep_threshold")]
    pub sweep_threshold: u64,
    /// Hard store capacity (default: 10,000).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            freshness_secs: default_freshness_secs(),
            sweep_threshold: default_sweep_threshold(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheSection {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .freshness(Duration::from_secs(self.freshness_secs))
            .sweep_threshold(self.sweep_threshold)
            .max_entries(self.max_entries)
    }
}

fn default_freshness_secs() -> u64 {
    300
}

fn default_sweep_threshold() -> u64 {
    100
}

fn default_max_entries() -> u64 {
    10_000
}

/// Strategy timing and concurrency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchSection {
    /// Debounce delay in milliseconds (default: 100).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Throttle interval in milliseconds (default: 1000).
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Queued requests allowed on the network at once (default: 6).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            throttle_ms: default_throttle_ms(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_throttle_ms() -> u64 {
    1_000
}

fn default_max_concurrent() -> usize {
    6
}

/// HTTP transport settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportSection {
    /// API base URL. Required unless a transport is supplied in code.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    ///
    /// Falls back to the defaults when no file exists and no explicit path
    /// was given.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{ResourcePattern, Strategy};

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.cache.freshness_secs, 300);
        assert_eq!(config.cache.sweep_threshold, 100);
        assert_eq!(config.dispatch.debounce_ms, 100);
        assert_eq!(config.dispatch.throttle_ms, 1_000);
        assert_eq!(config.dispatch.max_concurrent, 6);
        assert_eq!(config.transport.timeout_secs, 30);
        assert!(config.transport.base_url.is_none());
        assert!(config.policy.is_empty());
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [transport]
            base_url = "http://localhost:8080"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.transport.base_url.as_deref(),
            Some("http://localhost:8080")
        );
        // Defaults preserved
        assert_eq!(config.dispatch.max_concurrent, 6);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [cache]
            freshness_secs = 60
            sweep_threshold = 500
            max_entries = 2000

            [dispatch]
            debounce_ms = 250
            throttle_ms = 5000
            max_concurrent = 2

            [transport]
            base_url = "https://api.example.com"
            timeout_secs = 10

            [[policy]]
            pattern = "/rooms/*"
            strategy = "cached"

            [[policy]]
            pattern = "**/search"
            strategy = "debounced"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let cache = config.cache.to_cache_config();
        assert_eq!(cache.freshness, Duration::from_secs(60));
        assert_eq!(cache.sweep_threshold, 500);
        assert_eq!(cache.max_entries, 2000);
        assert_eq!(config.dispatch.debounce_ms, 250);
        assert_eq!(config.dispatch.max_concurrent, 2);
        assert_eq!(config.transport.timeout_secs, 10);
        assert_eq!(
            config.policy,
            vec![
                PolicyRule::new(ResourcePattern::Prefix("/rooms".into()), Strategy::Cached),
                PolicyRule::new(ResourcePattern::Segment("search".into()), Strategy::Debounced),
            ]
        );
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let toml = r#"
            [[policy]]
            pattern = "/rooms"
            strategy = "eventually"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn malformed_pattern_is_rejected() {
        let toml = r#"
            [[policy]]
            pattern = "rooms"
            strategy = "cached"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }
}
