//! Test fixtures wiring the full processing stack.

use std::sync::Arc;
use std::time::Duration;

use super::ScriptedBackend;
use crate::cache::{KeyValueBackend, ResilientCacheClient};
use crate::config::{CacheConfig, ProcessorConfig, RetrySettings};
use crate::handler::MessageHandler;
use crate::pipeline::{EntityProcessor, ProcessedCounter, ScopedKey};
use crate::store::{ResultStore, StateStore};

/// Cache configuration with short delays, suitable for tests.
///
/// 1s timeout, 60s expiration, 10ms..80ms backoff, 3 retries.
#[must_use]
pub fn fast_cache_config() -> CacheConfig {
    CacheConfig::new()
        .with_key_prefix("test")
        .with_timeout(Duration::from_secs(1))
        .with_expiration(Duration::from_secs(60))
        .with_retry(
            RetrySettings::new()
                .with_backoff_initial(Duration::from_millis(10))
                .with_backoff_max(Duration::from_millis(80))
                .with_max_retries(3),
        )
}

/// A backend, cache client, stores, processor and handler wired together.
#[derive(Debug)]
pub struct TestHarness {
    /// The scripted backend.
    pub backend: Arc<ScriptedBackend>,
    /// The cache client over the backend.
    pub cache: Arc<ResilientCacheClient>,
    /// State store over the cache client.
    pub states: StateStore,
    /// Result store over the cache client.
    pub results: ResultStore,
    /// The processor.
    pub processor: Arc<EntityProcessor>,
    /// The handler over the processor.
    pub handler: Arc<MessageHandler>,
}

impl TestHarness {
    /// Wires a harness over `backend` with [`fast_cache_config`].
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    #[must_use]
    pub fn new(backend: ScriptedBackend) -> Self {
        Self::with_config(backend, &fast_cache_config(), &ProcessorConfig::default())
    }

    /// Wires a harness with explicit configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    #[must_use]
    pub fn with_config(
        backend: ScriptedBackend,
        cache_config: &CacheConfig,
        processor_config: &ProcessorConfig,
    ) -> Self {
        let backend = Arc::new(backend);
        let shared: Arc<dyn KeyValueBackend> = backend.clone();
        let cache = Arc::new(
            ResilientCacheClient::new(shared, cache_config).expect("valid cache config"),
        );
        let processor = Arc::new(
            EntityProcessor::from_cache(
                Arc::clone(&cache),
                processor_config,
                Arc::new(ProcessedCounter::new()),
            )
            .expect("valid processor config"),
        );
        let handler = Arc::new(MessageHandler::new(Arc::clone(&processor)));

        Self {
            backend,
            states: StateStore::new(Arc::clone(&cache)),
            results: ResultStore::new(Arc::clone(&cache)),
            cache,
            processor,
            handler,
        }
    }

    /// Returns the stored state for a lane of an entity, read straight from
    /// the backing store.
    #[must_use]
    pub fn state_of(&self, entity_id: &str, lane: u32) -> Option<String> {
        let key = self.states.record_key(ScopedKey::new(entity_id, lane).as_str());
        self.backend.inner().value_of(&self.cache.qualified_key(&key))
    }

    /// Returns the stored result for a lane of an entity, read straight from
    /// the backing store.
    #[must_use]
    pub fn result_of(&self, entity_id: &str, lane: u32) -> Option<String> {
        let key = self.results.record_key(ScopedKey::new(entity_id, lane).as_str());
        self.backend.inner().value_of(&self.cache.qualified_key(&key))
    }
}
