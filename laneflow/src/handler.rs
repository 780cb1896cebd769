//! Per-message entry point.
//!
//! The handler turns an inbound stream message into a call to the
//! [`EntityProcessor`] and reports back whether the transport should
//! acknowledge or reject it. Errors never escape this boundary; deciding
//! between redelivery and dead-lettering is the transport's job.

use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{error, info_span, Instrument};

use crate::errors::HandlerError;
use crate::pipeline::{EntityProcessor, ProcessReport};

/// Header carrying the message type label.
pub const MESSAGE_TYPE_HEADER: &str = "messageType";

/// Label used when a message carries no type header.
pub const UNKNOWN_MESSAGE_TYPE: &str = "UNKNOWN";

/// A message as delivered by the stream transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Message key; the entity identifier.
    pub key: Option<String>,
    /// Opaque payload.
    pub payload: Vec<u8>,
    /// Headers in delivery order. Names may repeat.
    pub headers: Vec<(String, Vec<u8>)>,
    /// Producer timestamp.
    pub timestamp: DateTime<Utc>,
    /// Partition the message was read from.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
}

impl InboundMessage {
    /// Creates a keyed message on partition 0, offset 0, stamped now.
    #[must_use]
    pub fn new(key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Some(key.into()),
            payload: payload.into(),
            headers: Vec::new(),
            timestamp: Utc::now(),
            partition: 0,
            offset: 0,
        }
    }

    /// Removes the key.
    #[must_use]
    pub fn without_key(mut self) -> Self {
        self.key = None;
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the partition.
    #[must_use]
    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = partition;
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the producer timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the value of the last header named `name`.
    #[must_use]
    pub fn last_header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .rev()
            .find(|(header, _)| header == name)
            .map(|(_, value)| value.as_slice())
    }

    /// Returns the message type label, or [`UNKNOWN_MESSAGE_TYPE`].
    #[must_use]
    pub fn message_type(&self) -> Cow<'_, str> {
        self.last_header(MESSAGE_TYPE_HEADER)
            .map_or(Cow::Borrowed(UNKNOWN_MESSAGE_TYPE), String::from_utf8_lossy)
    }
}

/// Terminal delivery decision for one message.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// The message was processed; commit it.
    Ack,
    /// The message failed; carries the triggering error.
    Reject(HandlerError),
}

impl Delivery {
    /// Returns true for [`Delivery::Ack`].
    #[must_use]
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }

    /// Returns true for [`Delivery::Reject`].
    #[must_use]
    pub fn is_reject(&self) -> bool {
        matches!(self, Self::Reject(_))
    }

    /// Returns the rejection cause, if any.
    #[must_use]
    pub fn error(&self) -> Option<&HandlerError> {
        match self {
            Self::Ack => None,
            Self::Reject(error) => Some(error),
        }
    }
}

/// Maps each inbound message to a processing call and a delivery decision.
#[derive(Debug, Clone)]
pub struct MessageHandler {
    processor: Arc<EntityProcessor>,
}

impl MessageHandler {
    /// Creates a handler over a shared processor.
    #[must_use]
    pub fn new(processor: Arc<EntityProcessor>) -> Self {
        Self { processor }
    }

    /// Returns the processor.
    #[must_use]
    pub fn processor(&self) -> &Arc<EntityProcessor> {
        &self.processor
    }

    /// Handles one message.
    ///
    /// Safe to call again for a redelivered message, but state accumulates on
    /// every successful pass, so a redelivery yields different values than a
    /// clean first delivery.
    pub async fn on_message(&self, message: &InboundMessage) -> Delivery {
        let message_type = message.message_type();
        let span = info_span!(
            "message",
            entity_id = message.key.as_deref().unwrap_or_default(),
            message_type = %message_type,
            partition = message.partition,
            offset = message.offset,
        );

        match self.handle(message).instrument(span.clone()).await {
            Ok(_) => Delivery::Ack,
            Err(err) => {
                span.in_scope(|| {
                    error!(error = %err, "Error while consuming message, rejecting");
                });
                Delivery::Reject(err)
            }
        }
    }

    async fn handle(&self, message: &InboundMessage) -> Result<ProcessReport, HandlerError> {
        let entity_id = message.key.as_deref().ok_or(HandlerError::MissingKey {
            partition: message.partition,
            offset: message.offset,
        })?;

        let report = self
            .processor
            .process(entity_id, &message.payload, message.timestamp)
            .await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{CacheError, LaneStep};
    use crate::testing::{ScriptedBackend, TestHarness};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_type_defaults_to_unknown() {
        let message = InboundMessage::new("e1", b"x".to_vec());
        assert_eq!(message.message_type(), UNKNOWN_MESSAGE_TYPE);
    }

    #[test]
    fn test_message_type_uses_last_header() {
        let message = InboundMessage::new("e1", b"x".to_vec())
            .with_header(MESSAGE_TYPE_HEADER, "CREATED")
            .with_header("other", "ignored")
            .with_header(MESSAGE_TYPE_HEADER, "UPDATED");
        assert_eq!(message.message_type(), "UPDATED");
        assert_eq!(message.last_header("other"), Some(&b"ignored"[..]));
        assert_eq!(message.last_header("missing"), None);
    }

    #[test]
    fn test_message_type_tolerates_invalid_utf8() {
        let message =
            InboundMessage::new("e1", Vec::new()).with_header(MESSAGE_TYPE_HEADER, vec![0xff, b'A']);
        assert_eq!(message.message_type(), "\u{fffd}A");
    }

    #[tokio::test]
    async fn test_successful_processing_acknowledges() {
        let harness = TestHarness::new(ScriptedBackend::new());
        let message = InboundMessage::new("e1", vec![0u8; 10])
            .with_header(MESSAGE_TYPE_HEADER, "CREATED");

        let delivery = harness.handler.on_message(&message).await;

        assert!(delivery.is_ack());
        assert!(delivery.error().is_none());
        assert_eq!(harness.state_of("e1", 0).as_deref(), Some("initial:10:0"));
        assert_eq!(harness.processor.processed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_failure_rejects() {
        let harness = TestHarness::new(ScriptedBackend::new().failing_sets_from(1));
        let message = InboundMessage::new("e1", b"abc".to_vec());

        let delivery = harness.handler.on_message(&message).await;

        assert!(delivery.is_reject());
        match delivery.error() {
            Some(HandlerError::Processing(err)) => {
                assert_eq!(err.lane, 0);
                assert_eq!(err.step, LaneStep::WriteState);
                assert!(matches!(err.source, CacheError::Backend { .. }));
            }
            other => panic!("unexpected delivery error: {other:?}"),
        }
        assert_eq!(harness.processor.processed_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_rejects_without_touching_backend() {
        let harness = TestHarness::new(ScriptedBackend::new());
        let message = InboundMessage::new("e1", b"abc".to_vec())
            .without_key()
            .with_partition(3)
            .with_offset(42);

        let delivery = harness.handler.on_message(&message).await;

        assert!(matches!(
            delivery.error(),
            Some(HandlerError::MissingKey {
                partition: 3,
                offset: 42
            })
        ));
        assert_eq!(harness.backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_redelivery_accumulates_state() {
        let harness = TestHarness::new(ScriptedBackend::new());
        let message = InboundMessage::new("e1", b"abcd".to_vec());

        assert!(harness.handler.on_message(&message).await.is_ack());
        assert!(harness.handler.on_message(&message).await.is_ack());

        assert_eq!(harness.state_of("e1", 2).as_deref(), Some("initial:4:2:4:2"));
    }
}
