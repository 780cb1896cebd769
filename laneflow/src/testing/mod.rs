//! Testing utilities for laneflow.
//!
//! This module provides:
//! - A scriptable backend for injecting failures and hangs
//! - A harness wiring backend, cache client, stores, processor and handler

mod backends;
mod fixtures;

pub use backends::{BackendCall, ScriptedBackend};
pub use fixtures::{fast_cache_config, TestHarness};
