//! Entity processing pipeline.
//!
//! This module provides:
//! - Scoped lane keys and the state/result derivation rules
//! - The per-message lane loop over the state and result stores
//! - The processed-message counter

mod counter;
mod lanes;
mod processor;

pub use counter::ProcessedCounter;
pub use lanes::{
    fingerprint, next_result, next_state, ScopedKey, DEFAULT_LANES, INITIAL_STATE, NO_RESULT,
};
pub use processor::{EntityProcessor, LaneOutcome, ProcessReport};
