//! Configuration for webhook delivery

use crate::{Result, RetryPolicy, WebhookError};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default environment variable prefix for [`WebhookConfig::from_env`]
pub const DEFAULT_ENV_PREFIX: &str = "HOOKLINE_WEBHOOK";

/// Configuration for the webhook delivery engine
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Timeout for a single delivery attempt
    pub timeout: Duration,

    /// User-Agent header for outgoing requests
    pub user_agent: String,

    /// Retry policy applied to every subscription
    pub retry_policy: RetryPolicy,

    /// Whether to verify SSL certificates
    pub verify_ssl: bool,

    /// Maximum serialized event size in bytes
    pub max_payload_size: usize,

    /// Upper bound on simultaneous HTTP attempts; `None` means unbounded
    pub max_concurrent_deliveries: Option<usize>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            user_agent: format!("Hookline-Webhooks/{}", env!("CARGO_PKG_VERSION")),
            retry_policy: RetryPolicy::default(),
            verify_ssl: true,
            max_payload_size: 1024 * 1024, // 1MB
            max_concurrent_deliveries: None,
        }
    }
}

impl WebhookConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> WebhookConfigBuilder {
        WebhookConfigBuilder::new()
    }

    /// Load from `HOOKLINE_WEBHOOK_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Load from environment variables named `<prefix>_<KEY>`.
    ///
    /// Unset variables keep their defaults; set but unparsable ones are an error.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let lookup = |key: &str| std::env::var(format!("{}_{}", prefix, key)).ok();

        let settings = WebhookSettings {
            timeout_ms: parse_var(prefix, "TIMEOUT_MS", lookup("TIMEOUT_MS"))?,
            user_agent: lookup("USER_AGENT"),
            max_attempts: parse_var(prefix, "MAX_ATTEMPTS", lookup("MAX_ATTEMPTS"))?,
            backoff_initial_ms: parse_var(
                prefix,
                "BACKOFF_INITIAL_MS",
                lookup("BACKOFF_INITIAL_MS"),
            )?,
            backoff_max_ms: parse_var(prefix, "BACKOFF_MAX_MS", lookup("BACKOFF_MAX_MS"))?,
            backoff_multiplier: parse_var(
                prefix,
                "BACKOFF_MULTIPLIER",
                lookup("BACKOFF_MULTIPLIER"),
            )?,
            jitter: parse_bool(prefix, "JITTER", lookup("JITTER"))?,
            verify_ssl: parse_bool(prefix, "VERIFY_SSL", lookup("VERIFY_SSL"))?,
            max_payload_size: parse_var(prefix, "MAX_PAYLOAD_SIZE", lookup("MAX_PAYLOAD_SIZE"))?,
            max_concurrency: parse_var(prefix, "MAX_CONCURRENCY", lookup("MAX_CONCURRENCY"))?,
        };

        settings.into_config()
    }

    /// Parse a flat TOML document of snake_case keys
    ///
    /// ```toml
    /// timeout_ms = 2500
    /// max_attempts = 5
    /// backoff_initial_ms = 200
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: WebhookSettings = toml::from_str(content)
            .map_err(|e| WebhookError::Config(format!("TOML parse error: {}", e)))?;
        settings.into_config()
    }

    /// Load a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WebhookError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(WebhookError::Config("timeout must be non-zero".into()));
        }
        if self.retry_policy.max_attempts == 0 {
            return Err(WebhookError::Config("max_attempts must be at least 1".into()));
        }
        if self.retry_policy.backoff_multiplier < 1.0 {
            return Err(WebhookError::Config(
                "backoff_multiplier must be at least 1.0".into(),
            ));
        }
        if self.max_concurrent_deliveries == Some(0) {
            return Err(WebhookError::Config(
                "max_concurrent_deliveries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for WebhookConfig
#[derive(Debug, Clone, Default)]
pub struct WebhookConfigBuilder {
    config: WebhookConfig,
}

impl WebhookConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: WebhookConfig::default(),
        }
    }

    /// Set the per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the per-attempt timeout in milliseconds
    pub fn timeout_ms(mut self, millis: u64) -> Self {
        self.config.timeout = Duration::from_millis(millis);
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    /// Disable retries
    pub fn no_retries(mut self) -> Self {
        self.config.retry_policy = RetryPolicy::none();
        self
    }

    /// Set SSL verification
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.config.verify_ssl = verify;
        self
    }

    /// Set maximum payload size
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Bound the number of simultaneous HTTP attempts
    pub fn max_concurrent_deliveries(mut self, limit: usize) -> Self {
        self.config.max_concurrent_deliveries = Some(limit);
        self
    }

    /// Build the configuration
    pub fn build(self) -> WebhookConfig {
        self.config
    }
}

/// Flat, serializable form shared by the env and TOML loaders
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WebhookSettings {
    timeout_ms: Option<u64>,
    user_agent: Option<String>,
    max_attempts: Option<u32>,
    backoff_initial_ms: Option<u64>,
    backoff_max_ms: Option<u64>,
    backoff_multiplier: Option<f64>,
    jitter: Option<bool>,
    verify_ssl: Option<bool>,
    max_payload_size: Option<usize>,
    max_concurrency: Option<usize>,
}

impl WebhookSettings {
    fn into_config(self) -> Result<WebhookConfig> {
        let mut config = WebhookConfig::default();

        if let Some(ms) = self.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }
        if let Some(attempts) = self.max_attempts {
            config.retry_policy.max_attempts = attempts;
        }
        if let Some(ms) = self.backoff_initial_ms {
            config.retry_policy.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.backoff_max_ms {
            config.retry_policy.max_delay = Duration::from_millis(ms);
        }
        if let Some(multiplier) = self.backoff_multiplier {
            config.retry_policy.backoff_multiplier = multiplier;
        }
        if let Some(jitter) = self.jitter {
            config.retry_policy.jitter = jitter;
        }
        if let Some(verify) = self.verify_ssl {
            config.verify_ssl = verify;
        }
        if let Some(size) = self.max_payload_size {
            config.max_payload_size = size;
        }
        config.max_concurrent_deliveries = self.max_concurrency;

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: FromStr>(prefix: &str, key: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                WebhookError::Config(format!("{}_{} has invalid value '{}'", prefix, key, raw))
            })
        })
        .transpose()
}

fn parse_bool(prefix: &str, key: &str, value: Option<String>) -> Result<Option<bool>> {
    value
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(WebhookError::Config(format!(
                "{}_{} has invalid value '{}'",
                prefix, key, raw
            ))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WebhookConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert!(config.verify_ssl);
        assert_eq!(config.max_payload_size, 1024 * 1024);
        assert!(config.max_concurrent_deliveries.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = WebhookConfig::builder()
            .timeout_ms(250)
            .verify_ssl(false)
            .max_payload_size(2048)
            .max_concurrent_deliveries(8)
            .build();

        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(!config.verify_ssl);
        assert_eq!(config.max_payload_size, 2048);
        assert_eq!(config.max_concurrent_deliveries, Some(8));
    }

    #[test]
    fn test_from_toml() {
        let config = WebhookConfig::from_toml_str(
            r#"
            timeout_ms = 2500
            max_attempts = 5
            backoff_initial_ms = 200
            backoff_max_ms = 10000
            jitter = false
            max_concurrency = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.retry_policy.max_attempts, 5);
        assert_eq!(config.retry_policy.initial_delay, Duration::from_millis(200));
        assert_eq!(config.retry_policy.max_delay, Duration::from_secs(10));
        assert!(!config.retry_policy.jitter);
        assert_eq!(config.max_concurrent_deliveries, Some(4));
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let result = WebhookConfig::from_toml_str("retries = 3");
        assert!(matches!(result, Err(WebhookError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let result = WebhookConfig::from_toml_str("max_attempts = 0");
        assert!(matches!(result, Err(WebhookError::Config(_))));

        let result = WebhookConfig::from_toml_str("timeout_ms = 0");
        assert!(matches!(result, Err(WebhookError::Config(_))));

        let result = WebhookConfig::from_toml_str("backoff_multiplier = 0.5");
        assert!(matches!(result, Err(WebhookError::Config(_))));
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(
            parse_var::<u64>("P", "K", Some(" 42 ".into())).unwrap(),
            Some(42)
        );
        assert!(parse_var::<u64>("P", "K", Some("abc".into())).is_err());
        assert_eq!(parse_var::<u64>("P", "K", None).unwrap(), None);

        assert_eq!(parse_bool("P", "K", Some("YES".into())).unwrap(), Some(true));
        assert_eq!(parse_bool("P", "K", Some("0".into())).unwrap(), Some(false));
        assert!(parse_bool("P", "K", Some("maybe".into())).is_err());
    }
}
