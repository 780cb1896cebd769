//! # Laneflow
//!
//! Keyed stream message processing over a resilient key-value cache.
//!
//! Each inbound message names an entity. For every lane of that entity the
//! pipeline reads the previous state and result from the cache, derives the
//! next ones, and writes them back, lane by lane. The pieces are:
//!
//! - **Resilient cache client**: retry with exponential backoff under one
//!   overall timeout, over a pluggable async key-value backend
//! - **Record stores**: typed `find`/`save` views for state and result records
//! - **Entity processor**: the per-lane read-modify-write chain
//! - **Message handler**: maps processing outcomes to acknowledge/reject
//! - **Partition dispatcher**: one sequential worker per stream partition
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use laneflow::prelude::*;
//! use std::sync::Arc;
//!
//! let backend: Arc<dyn KeyValueBackend> = Arc::new(InMemoryBackend::new());
//! let cache = Arc::new(ResilientCacheClient::new(backend, &CacheConfig::default())?);
//! let processor = EntityProcessor::from_cache(
//!     cache,
//!     &ProcessorConfig::default(),
//!     Arc::new(ProcessedCounter::new()),
//! )?;
//! let handler = MessageHandler::new(Arc::new(processor));
//!
//! let delivery = handler.on_message(&InboundMessage::new("e1", b"payload".to_vec())).await;
//! assert!(delivery.is_ack());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod config;
pub mod errors;
pub mod handler;
pub mod observability;
pub mod pipeline;
pub mod store;
pub mod testing;
pub mod worker;


/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{
        BackoffPolicy, InMemoryBackend, JitterStrategy, KeyValueBackend, ResilientCacheClient,
    };
    #[cfg(feature = "redis")]
    pub use crate::cache::RedisBackend;
    pub use crate::config::{CacheConfig, LaneflowConfig, ProcessorConfig, RetrySettings};
    pub use crate::errors::{
        BackendError, CacheError, ConfigError, HandlerError, LaneStep, LaneflowError,
        ProcessError,
    };
    pub use crate::handler::{Delivery, InboundMessage, MessageHandler};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{EntityProcessor, ProcessReport, ProcessedCounter, ScopedKey};
    pub use crate::store::{ResultStore, StateStore};
    pub use crate::worker::{DeliveryReport, PartitionDispatcher};
}
