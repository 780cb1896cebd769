//! Configuration types.
//!
//! Loading configuration from a deployment source is left to the embedding
//! service; these structs deserialize from any serde format and validate
//! themselves before use.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::JitterStrategy;
use crate::errors::ConfigError;

/// Retry behaviour for cache operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    /// Upper bound for any single backoff delay in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Jitter applied to each backoff delay.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

fn default_backoff_initial_ms() -> u64 {
    100
}

fn default_backoff_max_ms() -> u64 {
    2_000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            max_retries: default_max_retries(),
            jitter: JitterStrategy::None,
        }
    }
}

impl RetrySettings {
    /// Creates retry settings with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial backoff delay.
    #[must_use]
    pub fn with_backoff_initial(mut self, delay: Duration) -> Self {
        self.backoff_initial_ms = duration_millis(delay);
        self
    }

    /// Sets the maximum backoff delay.
    #[must_use]
    pub fn with_backoff_max(mut self, delay: Duration) -> Self {
        self.backoff_max_ms = duration_millis(delay);
        self
    }

    /// Sets the maximum retry count.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the initial backoff delay.
    #[must_use]
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    /// Returns the maximum backoff delay.
    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backoff_initial_ms > self.backoff_max_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff_initial_ms ({}) exceeds retry.backoff_max_ms ({})",
                self.backoff_initial_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }
}

/// Configuration for the resilient cache client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Namespace prepended to every key as `<prefix>:<key>`.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Deadline for a whole operation, retries included, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Entry expiration in seconds, reset on every write.
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: u64,
    /// Retry configuration.
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_key_prefix() -> String {
    "reproducer".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_expiration_secs() -> u64 {
    3_600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            timeout_ms: default_timeout_ms(),
            expiration_secs: default_expiration_secs(),
            retry: RetrySettings::default(),
        }
    }
}

impl CacheConfig {
    /// Creates a cache configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the operation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = duration_millis(timeout);
        self
    }

    /// Sets the entry expiration.
    #[must_use]
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration_secs = expiration.as_secs();
        self
    }

    /// Sets the retry settings.
    #[must_use]
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the operation timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the entry expiration.
    #[must_use]
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::Invalid("cache.key_prefix must not be empty".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("cache.timeout_ms must be positive".into()));
        }
        // SETEX rejects a zero TTL.
        if self.expiration_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache.expiration_secs must be at least 1".into(),
            ));
        }
        self.retry.validate()
    }
}

/// Configuration for the entity processing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Number of lanes tracked per entity.
    #[serde(default = "default_lanes")]
    pub lanes: u32,
}

fn default_lanes() -> u32 {
    3
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            lanes: default_lanes(),
        }
    }
}

impl ProcessorConfig {
    /// Sets the lane count.
    #[must_use]
    pub fn with_lanes(mut self, lanes: u32) -> Self {
        self.lanes = lanes;
        self
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lanes == 0 {
            return Err(ConfigError::Invalid("processor.lanes must be at least 1".into()));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneflowConfig {
    /// Cache client configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Pipeline configuration.
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// Capacity of each partition worker's queue.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_queue_depth() -> usize {
    64
}

impl LaneflowConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.processor.validate()?;
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid("queue_depth must be at least 1".into()));
        }
        Ok(())
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.key_prefix, "reproducer");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.expiration(), Duration::from_secs(3600));
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_key_prefix("svc")
            .with_timeout(Duration::from_millis(750))
            .with_expiration(Duration::from_secs(60))
            .with_retry(
                RetrySettings::new()
                    .with_backoff_initial(Duration::from_millis(10))
                    .with_backoff_max(Duration::from_millis(80))
                    .with_max_retries(5),
            );

        assert_eq!(config.key_prefix, "svc");
        assert_eq!(config.timeout_ms, 750);
        assert_eq!(config.expiration_secs, 60);
        assert_eq!(config.retry.backoff_initial(), Duration::from_millis(10));
        assert_eq!(config.retry.backoff_max(), Duration::from_millis(80));
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = LaneflowConfig::from_json_str(
            r#"{"cache": {"timeout_ms": 200, "retry": {"max_retries": 7}}}"#,
        )
        .unwrap();

        assert_eq!(config.cache.timeout_ms, 200);
        assert_eq!(config.cache.retry.max_retries, 7);
        assert_eq!(config.cache.retry.backoff_initial_ms, 100);
        assert_eq!(config.processor.lanes, 3);
        assert_eq!(config.queue_depth, 64);
    }

    #[test]
    fn test_from_json_parses_jitter() {
        let config =
            LaneflowConfig::from_json_str(r#"{"cache": {"retry": {"jitter": "equal"}}}"#).unwrap();
        assert_eq!(config.cache.retry.jitter, JitterStrategy::Equal);
    }

    #[test]
    fn test_validation_rejects_inverted_backoff() {
        let config = CacheConfig::new().with_retry(
            RetrySettings::new()
                .with_backoff_initial(Duration::from_secs(5))
                .with_backoff_max(Duration::from_secs(1)),
        );
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        assert!(CacheConfig::new().with_timeout(Duration::ZERO).validate().is_err());
        assert!(CacheConfig::new().with_expiration(Duration::from_millis(500)).validate().is_err());
        assert!(ProcessorConfig::default().with_lanes(0).validate().is_err());

        let err = LaneflowConfig::from_json_str(r#"{"queue_depth": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_from_json_reports_parse_errors() {
        let err = LaneflowConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
