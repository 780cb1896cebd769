//! Logging setup.
//!
//! Library code only emits `tracing` events and spans; the embedding service
//! decides where they go. [`init_tracing`] is a convenience for binaries and
//! tests that have no subscriber of their own.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output format for [`init_tracing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Installs a global `tracing` subscriber filtered by `RUST_LOG`
/// (default `info`).
///
/// Safe to call multiple times; only the first call installs a subscriber.
/// Returns true if this call installed it.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .try_init()
            .is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_a_noop_once_a_subscriber_exists() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        assert!(!init_tracing(LogFormat::Json));
        assert!(!init_tracing(LogFormat::Text));
    }

    #[test]
    fn test_log_format_parses() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }
}
