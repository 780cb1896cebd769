//! Typed record stores over the resilient cache client.
//!
//! A store is a pass-through view: it adds no transformation, validation or
//! merging. Each record kind owns a fixed namespace under the cache client's
//! prefix, so state and result records for the same scoped key never collide:
//! `<prefix>:state:<key>` and `<prefix>:result:<key>`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug_span, Instrument};

use crate::cache::ResilientCacheClient;
use crate::errors::CacheError;

/// Names the kind of record a [`RecordStore`] holds.
pub trait RecordKind: Send + Sync + 'static {
    /// Store name used in span names and logs.
    const NAME: &'static str;

    /// Key namespace inserted between the cache prefix and the record key.
    const NAMESPACE: &'static str;
}

/// Accumulated per-lane state history.
#[derive(Debug, Clone, Copy)]
pub struct StateRecord;

impl RecordKind for StateRecord {
    const NAME: &'static str = "EntityStateStore";
    const NAMESPACE: &'static str = "state";
}

/// Chained per-lane result fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct ResultRecord;

impl RecordKind for ResultRecord {
    const NAME: &'static str = "EntityResultStore";
    const NAMESPACE: &'static str = "result";
}

/// Store for lane state values.
pub type StateStore = RecordStore<StateRecord>;

/// Store for lane result values.
pub type ResultStore = RecordStore<ResultRecord>;

/// A typed `find`/`save` facade over a shared [`ResilientCacheClient`].
pub struct RecordStore<K: RecordKind> {
    cache: Arc<ResilientCacheClient>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: RecordKind> RecordStore<K> {
    /// Creates a store over the shared cache client.
    #[must_use]
    pub fn new(cache: Arc<ResilientCacheClient>) -> Self {
        Self {
            cache,
            _kind: PhantomData,
        }
    }

    /// Returns the store name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        K::NAME
    }

    /// Returns the key handed to the cache client for `key`.
    #[must_use]
    pub fn record_key(&self, key: &str) -> String {
        format!("{}:{key}", K::NAMESPACE)
    }

    /// Looks up the record under `key`.
    ///
    /// `Ok(None)` means the key was never written or has expired; a backend
    /// failure is an error, never an absent record.
    pub async fn find(&self, key: &str) -> Result<Option<String>, CacheError> {
        let span = debug_span!("store.find", store = K::NAME, key);
        self.cache.get(&self.record_key(key)).instrument(span).await
    }

    /// Writes the record under `key`, replacing it and resetting its expiry.
    pub async fn save(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let span = debug_span!("store.save", store = K::NAME, key);
        self.cache
            .set(&self.record_key(key), value)
            .instrument(span)
            .await
    }
}

impl<K: RecordKind> Clone for RecordStore<K> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.cache))
    }
}

impl<K: RecordKind> fmt::Debug for RecordStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("name", &K::NAME)
            .field("cache", &self.cache)
            .finish()
    }
}
