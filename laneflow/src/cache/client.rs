//! Namespaced cache client with retry, backoff and timeout.

use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use super::retry::{retry_with_timeout, BackoffPolicy};
use super::KeyValueBackend;
use crate::config::CacheConfig;
use crate::errors::{BackendError, CacheError, ConfigError};

/// Cache client that turns single fallible backend calls into bounded
/// operations with uniform failure semantics.
///
/// Every key is stored as `<prefix>:<key>`. The client keeps no local copy of
/// any value; each call is a fresh round trip.
pub struct ResilientCacheClient {
    backend: Arc<dyn KeyValueBackend>,
    key_prefix: String,
    timeout: Duration,
    expiration_secs: u64,
    policy: BackoffPolicy,
}

impl std::fmt::Debug for ResilientCacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientCacheClient")
            .field("key_prefix", &self.key_prefix)
            .field("timeout", &self.timeout)
            .field("expiration_secs", &self.expiration_secs)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ResilientCacheClient {
    /// Creates a client over a shared backend.
    pub fn new(backend: Arc<dyn KeyValueBackend>, config: &CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            backend,
            key_prefix: config.key_prefix.clone(),
            timeout: config.timeout(),
            expiration_secs: config.expiration_secs,
            policy: BackoffPolicy::from_settings(&config.retry),
        })
    }

    /// Returns the namespace prefix.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Returns the fully qualified backend key for `key`.
    #[must_use]
    pub fn qualified_key(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    /// Stores `value` under `key` with the configured expiration.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let qualified = self.qualified_key(key);
        let ttl = self.expiration_secs;
        let backend = &self.backend;

        self.execute("set", &qualified, || backend.setex(&qualified, ttl, value))
            .await
    }

    /// Returns the value under `key`, or `None` if it does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let qualified = self.qualified_key(key);
        let backend = &self.backend;

        self.execute("get", &qualified, || backend.get(&qualified))
            .await
    }

    async fn execute<T, F, Fut>(
        &self,
        operation: &'static str,
        key: &str,
        op: F,
    ) -> Result<T, CacheError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, BackendError>>,
    {
        retry_with_timeout(operation, &self.policy, self.timeout, op)
            .await
            .map_err(|e| {
                error!(operation, key, error = %e, "Cache {} failed", operation);
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryBackend, MockKeyValueBackend};
    use crate::config::RetrySettings;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    fn fast_config() -> CacheConfig {
        CacheConfig::new()
            .with_key_prefix("test")
            .with_timeout(Duration::from_secs(1))
            .with_expiration(Duration::from_secs(120))
            .with_retry(
                RetrySettings::new()
                    .with_backoff_initial(Duration::from_millis(10))
                    .with_backoff_max(Duration::from_millis(50))
                    .with_max_retries(2),
            )
    }

    #[test]
    fn test_rejects_invalid_config() {
        let backend: Arc<dyn KeyValueBackend> = Arc::new(InMemoryBackend::new());
        let config = fast_config().with_timeout(Duration::ZERO);
        assert!(ResilientCacheClient::new(backend, &config).is_err());
    }

    #[tokio::test]
    async fn test_set_and_get_use_prefixed_keys() {
        let backend = Arc::new(InMemoryBackend::new());
        let client = ResilientCacheClient::new(backend.clone(), &fast_config()).unwrap();

        client.set("e1:0", "initial:10:0").await.unwrap();

        assert_eq!(backend.value_of("test:e1:0"), Some("initial:10:0".to_string()));
        assert_eq!(backend.ttl_of("test:e1:0").map(|t| t.as_secs() > 100), Some(true));
        assert_eq!(client.get("e1:0").await.unwrap(), Some("initial:10:0".to_string()));
    }

    #[tokio::test]
    async fn test_get_absent_key() {
        let backend = Arc::new(InMemoryBackend::new());
        let client = ResilientCacheClient::new(backend, &fast_config()).unwrap();

        assert_eq!(client.get("never-written").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_passes_expiration_seconds() {
        let mut backend = MockKeyValueBackend::new();
        backend
            .expect_setex()
            .withf(|key, ttl, value| key == "test:k" && *ttl == 120 && value == "v")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let client = ResilientCacheClient::new(Arc::new(backend), &fast_config()).unwrap();
        client.set("k", "v").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_retries_transient_failures() {
        let mut backend = MockKeyValueBackend::new();
        let mut seq = Sequence::new();
        backend
            .expect_get()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(BackendError::Unavailable("blip".to_string())));
        backend
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some("value".to_string())));

        let client = ResilientCacheClient::new(Arc::new(backend), &fast_config()).unwrap();
        assert_eq!(client.get("k").await.unwrap(), Some("value".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_surfaces_last_failure_after_retries() {
        let mut backend = MockKeyValueBackend::new();
        backend
            .expect_setex()
            .times(3)
            .returning(|_, _, _| Err(BackendError::Command("READONLY".to_string())));

        let client = ResilientCacheClient::new(Arc::new(backend), &fast_config()).unwrap();
        let err = client.set("k", "v").await.unwrap_err();

        match err {
            CacheError::Backend {
                operation,
                attempts,
                source,
            } => {
                assert_eq!(operation, "set");
                assert_eq!(attempts, 3);
                assert_eq!(source, BackendError::Command("READONLY".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_get_does_not_treat_failure_as_absent() {
        let mut backend = MockKeyValueBackend::new();
        backend
            .expect_get()
            .returning(|_| Err(BackendError::Connection("refused".to_string())));

        let config = fast_config().with_retry(RetrySettings::new().with_max_retries(0));
        let client = ResilientCacheClient::new(Arc::new(backend), &config).unwrap();

        assert!(client.get("k").await.is_err());
    }

    #[test]
    fn test_qualified_key() {
        let backend: Arc<dyn KeyValueBackend> = Arc::new(InMemoryBackend::new());
        let client = ResilientCacheClient::new(backend, &CacheConfig::default()).unwrap();
        assert_eq!(client.key_prefix(), "reproducer");
        assert_eq!(client.qualified_key("e1:2"), "reproducer:e1:2");
    }
}
