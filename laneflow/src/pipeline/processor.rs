//! The per-message lane loop.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::counter::ProcessedCounter;
use super::lanes::{next_result, next_state, ScopedKey, DEFAULT_LANES, INITIAL_STATE, NO_RESULT};
use crate::cache::ResilientCacheClient;
use crate::config::ProcessorConfig;
use crate::errors::{CacheError, ConfigError, LaneStep, ProcessError};
use crate::store::{ResultStore, StateStore};

/// Values written for one lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneOutcome {
    /// The scoped key of the lane.
    pub key: ScopedKey,
    /// The state written.
    pub state: String,
    /// The result written.
    pub result: String,
}

/// Summary of a fully processed message.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    /// Value of the processed counter after this message.
    pub ordinal: u64,
    /// The entity processed.
    pub entity_id: String,
    /// Per-lane outcomes, in lane order.
    pub lanes: Vec<LaneOutcome>,
    /// Time from the producer timestamp to completion, when the timestamp is
    /// not in the future.
    pub latency: Option<Duration>,
}

/// Derives and persists the chained state and result of every lane of an
/// entity.
///
/// Lanes run strictly in increasing order, each finishing its
/// read-compute-write sequence before the next begins. A failure aborts the
/// remaining lanes; lanes already written keep their values.
#[derive(Debug)]
pub struct EntityProcessor {
    state_store: StateStore,
    result_store: ResultStore,
    counter: Arc<ProcessedCounter>,
    lanes: u32,
}

impl EntityProcessor {
    /// Creates a processor with the default lane count.
    #[must_use]
    pub fn new(
        state_store: StateStore,
        result_store: ResultStore,
        counter: Arc<ProcessedCounter>,
    ) -> Self {
        Self {
            state_store,
            result_store,
            counter,
            lanes: DEFAULT_LANES,
        }
    }

    /// Creates a processor whose stores share one cache client.
    pub fn from_cache(
        cache: Arc<ResilientCacheClient>,
        config: &ProcessorConfig,
        counter: Arc<ProcessedCounter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let processor = Self::new(
            StateStore::new(Arc::clone(&cache)),
            ResultStore::new(cache),
            counter,
        );
        Ok(processor.with_lanes(config.lanes))
    }

    /// Sets the lane count.
    #[must_use]
    pub fn with_lanes(mut self, lanes: u32) -> Self {
        self.lanes = lanes;
        self
    }

    /// Returns the lane count.
    #[must_use]
    pub fn lanes(&self) -> u32 {
        self.lanes
    }

    /// Returns the shared processed counter.
    #[must_use]
    pub fn counter(&self) -> &Arc<ProcessedCounter> {
        &self.counter
    }

    /// Returns the number of messages processed without error.
    #[must_use]
    pub fn processed_count(&self) -> u64 {
        self.counter.get()
    }

    /// Resets the processed counter.
    pub fn reset_count(&self) {
        self.counter.reset();
    }

    /// Processes one message for `entity_id`.
    pub async fn process(
        &self,
        entity_id: &str,
        payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<ProcessReport, ProcessError> {
        let mut lanes = Vec::with_capacity(self.lanes as usize);
        for lane in 0..self.lanes {
            lanes.push(self.process_lane(entity_id, payload.len(), lane).await?);
        }

        let ordinal = self.counter.increment();
        let latency = (Utc::now() - received_at).to_std().ok();
        debug!(
            ordinal,
            entity_id,
            payload_bytes = payload.len(),
            latency_ms = latency.map(|l| u64::try_from(l.as_millis()).unwrap_or(u64::MAX)),
            "Processed message"
        );

        Ok(ProcessReport {
            ordinal,
            entity_id: entity_id.to_string(),
            lanes,
            latency,
        })
    }

    async fn process_lane(
        &self,
        entity_id: &str,
        payload_len: usize,
        lane: u32,
    ) -> Result<LaneOutcome, ProcessError> {
        let fail = |step: LaneStep| {
            move |source: CacheError| ProcessError {
                entity_id: entity_id.to_string(),
                lane,
                step,
                source,
            }
        };
        let key = ScopedKey::new(entity_id, lane);

        let previous_state = self
            .state_store
            .find(key.as_str())
            .await
            .map_err(fail(LaneStep::ReadState))?;
        let state = next_state(
            previous_state.as_deref().unwrap_or(INITIAL_STATE),
            payload_len,
            lane,
        );
        self.state_store
            .save(key.as_str(), &state)
            .await
            .map_err(fail(LaneStep::WriteState))?;

        let previous_result = self
            .result_store
            .find(key.as_str())
            .await
            .map_err(fail(LaneStep::ReadResult))?;
        let result = next_result(
            &key,
            &state,
            previous_result.as_deref().unwrap_or(NO_RESULT),
        );
        self.result_store
            .save(key.as_str(), &result)
            .await
            .map_err(fail(LaneStep::WriteResult))?;

        Ok(LaneOutcome { key, state, result })
    }
}
