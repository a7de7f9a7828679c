//! Builder for configuring orchestrator instances

use std::sync::Arc;
use std::time::Duration;

use super::debounce::{DEFAULT_DEBOUNCE, Debouncer};
use super::policy::{PolicyRule, PolicyTable};
use super::queue::{DEFAULT_MAX_CONCURRENT, RequestQueue};
use super::throttle::{DEFAULT_THROTTLE, ThrottleWindows};
use super::Orchestrator;
use crate::cache::{CacheConfig, ResponseCache};
use crate::config::Config;
use crate::transport::{DEFAULT_TIMEOUT, HttpTransport, Transport};
use crate::{HuginnError, Result};

/// Environment variable read for the HTTP bearer token.
pub const TOKEN_ENV_VAR: &str = "HUGINN_API_TOKEN";

/// Builder for configuring orchestrator instances.
///
/// ```rust,no_run
/// # use huginn::{Orchestrator, Strategy};
/// # use std::time::Duration;
/// # fn main() -> huginn::Result<()> {
/// let orchestrator = Orchestrator::builder()
///     .base_url("https://api.example.com")
///     .policy("/rooms/*", Strategy::Cached)?
///     .policy("**/search", Strategy::Debounced)?
///     .max_concurrent(4)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct OrchestratorBuilder {
    transport: Option<Arc<dyn Transport>>,
    base_url: Option<String>,
    timeout: Duration,
    bearer_token: Option<String>,
    cache: CacheConfig,
    policies: PolicyTable,
    debounce: Duration,
    throttle: Duration,
    max_concurrent: usize,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            bearer_token: None,
            cache: CacheConfig::default(),
            policies: PolicyTable::new(),
            debounce: DEFAULT_DEBOUNCE,
            throttle: DEFAULT_THROTTLE,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Start from a loaded configuration file.
    ///
    /// The bearer token is read from `HUGINN_API_TOKEN` when set.
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new()
            .cache_config(config.cache.to_cache_config())
            .debounce(Duration::from_millis(config.dispatch.debounce_ms))
            .throttle(Duration::from_millis(config.dispatch.throttle_ms))
            .max_concurrent(config.dispatch.max_concurrent)
            .timeout(Duration::from_secs(config.transport.timeout_secs))
            .policies(config.policy.iter().cloned().collect());
        if let Some(url) = &config.transport.base_url {
            builder = builder.base_url(url.clone());
        }
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            builder = builder.bearer_token(token);
        }
        builder
    }

    /// Use a custom transport (takes precedence over `base_url`).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use an [`HttpTransport`] against this base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the HTTP request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send this bearer token with every HTTP request.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Replace the whole policy table.
    pub fn policies(mut self, table: PolicyTable) -> Self {
        self.policies = table;
        self
    }

    /// Add one `pattern → strategy` rule.
    pub fn policy(mut self, pattern: &str, strategy: super::Strategy) -> Result<Self> {
        self.policies.push(PolicyRule::new(pattern.parse()?, strategy));
        Ok(self)
    }

    /// Set the debounce delay.
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = delay;
        self
    }

    /// Set the throttle interval.
    pub fn throttle(mut self, interval: Duration) -> Self {
        self.throttle = interval;
        self
    }

    /// Set the number of queued requests allowed on the network at once.
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Build the orchestrator.
    ///
    /// Fails when neither a transport nor a base URL is configured, or when
    /// `max_concurrent` is zero.
    pub fn build(self) -> Result<Orchestrator> {
        if self.max_concurrent == 0 {
            return Err(HuginnError::Configuration(
                "max_concurrent must be at least 1".into(),
            ));
        }

        let transport: Arc<dyn Transport> = match (self.transport, self.base_url) {
            (Some(transport), _) => transport,
            (None, Some(url)) => {
                let mut http = HttpTransport::with_timeout(url, self.timeout)?;
                if let Some(token) = self.bearer_token {
                    http = http.bearer_token(token);
                }
                Arc::new(http)
            }
            (None, None) => {
                return Err(HuginnError::Configuration(
                    "no transport configured: set base_url or transport".into(),
                ));
            }
        };

        Ok(Orchestrator::from_parts(
            transport,
            ResponseCache::new(&self.cache),
            self.policies,
            Debouncer::new(self.debounce),
            ThrottleWindows::new(self.throttle),
            RequestQueue::new(self.max_concurrent),
        ))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
