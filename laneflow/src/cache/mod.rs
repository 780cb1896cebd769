//! Resilient access to the external key-value cache.
//!
//! This module provides:
//! - The [`KeyValueBackend`] seam and an in-memory implementation
//! - A Redis implementation behind the `redis` feature
//! - The retry/backoff/timeout combinator shared by every operation
//! - [`ResilientCacheClient`], the namespaced `get`/`set` facade

mod backend;
mod client;
#[cfg(feature = "redis")]
mod redis_backend;
mod retry;

pub use backend::{InMemoryBackend, KeyValueBackend};
pub use client::ResilientCacheClient;
#[cfg(feature = "redis")]
pub use redis_backend::RedisBackend;
pub use retry::{retry_with_timeout, with_retry, BackoffPolicy, JitterStrategy};

#[cfg(test)]
pub use backend::MockKeyValueBackend;
