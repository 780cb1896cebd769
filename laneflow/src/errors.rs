//! Error types for laneflow.
//!
//! Failures are layered the same way calls are: a single backend round trip
//! fails with [`BackendError`], the resilient client turns exhausted retries or
//! an elapsed deadline into [`CacheError`], the pipeline pins the failing lane
//! in [`ProcessError`], and the handler wraps everything it rejects in
//! [`HandlerError`].

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The main error type for laneflow operations.
#[derive(Debug, Error)]
pub enum LaneflowError {
    /// A configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A cache access error.
    #[error("{0}")]
    Cache(#[from] CacheError),

    /// A processing pipeline error.
    #[error("{0}")]
    Process(#[from] ProcessError),

    /// A message handler error.
    #[error("{0}")]
    Handler(#[from] HandlerError),

    /// The partition dispatcher is no longer accepting messages.
    #[error("Dispatcher closed: {0}")]
    DispatcherClosed(String),
}

/// Failure of a single call against the key-value backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("Backend connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed the command.
    #[error("Backend command error: {0}")]
    Command(String),

    /// The backend is temporarily unavailable.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Terminal failure of a resilient cache operation.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Every attempt failed; carries the last backend failure.
    #[error("Cache {operation} failed after {attempts} attempt(s): {source}")]
    Backend {
        /// Operation name (`get` or `set`).
        operation: &'static str,
        /// Number of backend calls made.
        attempts: u32,
        /// The last failure.
        #[source]
        source: BackendError,
    },

    /// No result was produced within the configured window.
    #[error("Cache {operation} timed out after {after:?}")]
    Timeout {
        /// Operation name (`get` or `set`).
        operation: &'static str,
        /// The configured timeout.
        after: Duration,
    },
}

impl CacheError {
    /// Returns the name of the failed operation.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Backend { operation, .. } | Self::Timeout { operation, .. } => operation,
        }
    }

    /// Returns true if the operation hit its deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// The step within a lane at which processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneStep {
    /// Reading the previous state.
    ReadState,
    /// Writing the new state.
    WriteState,
    /// Reading the previous result.
    ReadResult,
    /// Writing the new result.
    WriteResult,
}

impl fmt::Display for LaneStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadState => "read_state",
            Self::WriteState => "write_state",
            Self::ReadResult => "read_result",
            Self::WriteResult => "write_result",
        };
        f.write_str(name)
    }
}

/// A lane failed and the remaining lanes of the message were skipped.
#[derive(Debug, Clone, Error)]
#[error("Processing entity '{entity_id}' aborted at lane {lane} ({step}): {source}")]
pub struct ProcessError {
    /// The entity being processed.
    pub entity_id: String,
    /// The lane that failed.
    pub lane: u32,
    /// The step within the lane that failed.
    pub step: LaneStep,
    /// The underlying cache failure.
    #[source]
    pub source: CacheError,
}

/// Reasons a message is rejected by the handler.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The message carried no key to derive the entity from.
    #[error("Message at partition {partition} offset {offset} has no key")]
    MissingKey {
        /// Partition of the message.
        partition: i32,
        /// Offset of the message.
        offset: i64,
    },

    /// The processing pipeline failed.
    #[error("{0}")]
    Processing(#[from] ProcessError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The configuration document could not be parsed.
    #[error("Configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Convenience result alias.
pub type Result<T, E = LaneflowError> = std::result::Result<T, E>;
