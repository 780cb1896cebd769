//! Key-value backend trait and the in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::BackendError;

/// The asynchronous key-value primitive the cache client is built on.
///
/// Implementations are shared across partition workers and must be safe for
/// concurrent use. Each call is a single round trip; retries and deadlines
/// are layered on top by [`super::ResilientCacheClient`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value and resetting
    /// its expiration to `ttl_seconds`.
    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), BackendError>;

    /// Returns the value under `key`, or `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory backend with per-entry expiration.
///
/// Expired entries read as absent and are evicted on access.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: DashMap<String, Entry>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the live value under a fully qualified key.
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    /// Returns the remaining time to live under a fully qualified key.
    #[must_use]
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at - now)
    }

    /// Returns every live key, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueBackend for InMemoryBackend {
    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), BackendError> {
        if ttl_seconds == 0 {
            return Err(BackendError::Command(
                "invalid expire time in 'setex' command".to_string(),
            ));
        }
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        Ok(None)
    }
}
