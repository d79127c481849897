use std::pin::Pin;

use async_trait::async_trait;
use common::StreamId;
use futures_util::Stream;
use tokio::sync::broadcast;

use crate::{EventEnvelope, EventStoreError, Result, Version};

/// Options for appending events to an existing stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the stream for optimistic concurrency control.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the stream to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store is responsible for persisting and retrieving events, and
/// for publishing every committed append to the live subscription feed
/// consumed by the projection engine. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Starts a new stream from its first event(s).
    ///
    /// Fails with `DuplicateStream` if the stream key already has events.
    /// The first event's version must be 1.
    ///
    /// Returns the version of the stream after the events.
    async fn start_stream(&self, events: Vec<EventEnvelope>) -> Result<Version>;

    /// Appends events to an existing stream.
    ///
    /// Events are appended atomically: either all become visible at the next
    /// versions or none do. Fails with `StreamNotFound` if the stream does
    /// not exist, and with `ConcurrencyConflict` if
    /// `options.expected_version` is set and does not match the current
    /// version.
    ///
    /// Returns the new version of the stream after appending.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Retrieves all events for a stream, in strict version order.
    ///
    /// Returns an empty vector if the stream does not exist.
    async fn read_stream(&self, stream_id: &StreamId) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events for a stream starting from a specific version
    /// (inclusive). Used by the projection engine to catch up from a cursor.
    async fn read_stream_from(
        &self,
        stream_id: &StreamId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Gets the current version of a stream.
    ///
    /// Returns None if the stream doesn't exist.
    async fn stream_version(&self, stream_id: &StreamId) -> Result<Option<Version>>;

    /// Streams all events in the store, in insertion order.
    ///
    /// Per-stream version order is preserved; no global cross-stream order
    /// is guaranteed beyond insertion order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Subscribes to the live feed of committed events.
    ///
    /// Every successful `start_stream`/`append` publishes its envelopes to
    /// this feed after commit, in per-stream version order. The feed is
    /// lossy under lag; subscribers recover missed events by catching up
    /// from `stream_all_events`/`read_stream_from`.
    fn subscribe(&self) -> broadcast::Receiver<EventEnvelope>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event to an existing stream.
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    /// Starts a stream from a single first event.
    async fn start_stream_with(&self, event: EventEnvelope) -> Result<Version> {
        self.start_stream(vec![event]).await
    }

    /// Checks if a stream exists (has any events).
    async fn stream_exists(&self, stream_id: &StreamId) -> Result<bool> {
        Ok(self.stream_version(stream_id).await?.is_some())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates an event batch before persisting it.
///
/// All events must target the same stream with the same aggregate type, and
/// versions must be sequential.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    if events.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty event list".to_string(),
        ));
    }

    let first = &events[0];
    for event in events.iter().skip(1) {
        if event.stream_id != first.stream_id {
            return Err(EventStoreError::InvalidAppend(
                "all events must belong to the same stream".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "all events must have the same aggregate type".to_string(),
            ));
        }
    }

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}
