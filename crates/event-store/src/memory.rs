use std::sync::Arc;

use async_trait::async_trait;
use common::StreamId;
use tokio::sync::{RwLock, broadcast};

use crate::{
    EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

/// Capacity of the live subscription feed before slow subscribers lag.
const SUBSCRIPTION_BUFFER: usize = 1024;

/// In-memory event store implementation.
///
/// Used by tests and as the default backend when no database is configured.
/// Provides the same interface and concurrency semantics as the PostgreSQL
/// implementation.
#[derive(Clone)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
    feed: broadcast::Sender<EventEnvelope>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(SUBSCRIPTION_BUFFER);
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            feed,
        }
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }

    fn publish(&self, events: &[EventEnvelope]) {
        for event in events {
            // No receivers is fine; subscribers recover via catch-up anyway.
            let _ = self.feed.send(event.clone());
        }
        metrics::counter!("event_store_appends_total").increment(events.len() as u64);
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn start_stream(&self, events: Vec<EventEnvelope>) -> Result<Version> {
        validate_events_for_append(&events)?;

        let first = &events[0];
        if first.version != Version::first() {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream must start at version 1, got {}",
                first.version
            )));
        }
        let stream_id = first.stream_id.clone();

        let mut store = self.events.write().await;

        if store.iter().any(|e| e.stream_id == stream_id) {
            return Err(EventStoreError::DuplicateStream(stream_id));
        }

        let last_version = events.last().map(|e| e.version).unwrap_or(Version::first());
        store.extend(events.iter().cloned());
        self.publish(&events);

        Ok(last_version)
    }

    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let stream_id = events[0].stream_id.clone();

        let mut store = self.events.write().await;

        let current_version = store
            .iter()
            .filter(|e| e.stream_id == stream_id)
            .map(|e| e.version)
            .max();

        let Some(current_version) = current_version else {
            return Err(EventStoreError::StreamNotFound(stream_id));
        };

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                stream_id,
                expected,
                actual: current_version,
            });
        }

        // Version collision guard for unchecked appends.
        if events[0].version <= current_version {
            return Err(EventStoreError::ConcurrencyConflict {
                stream_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(current_version);
        store.extend(events.iter().cloned());
        self.publish(&events);

        Ok(last_version)
    }

    async fn read_stream(&self, stream_id: &StreamId) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| &e.stream_id == stream_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn read_stream_from(
        &self,
        stream_id: &StreamId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| &e.stream_id == stream_id && e.version >= from_version)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn stream_version(&self, stream_id: &StreamId) -> Result<Option<Version>> {
        let store = self.events.read().await;
        let version = store
            .iter()
            .filter(|e| &e.stream_id == stream_id)
            .map(|e| e.version)
            .max();
        Ok(version)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        // The backing vec is already in insertion order.
        let events = self.events.read().await.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_event(stream_id: &StreamId, version: Version, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .stream_id(stream_id.clone())
            .aggregate_type("SwapTrade")
            .event_type(event_type)
            .version(version)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
    }

    #[tokio::test]
    async fn start_stream_and_read_back() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");
        let event = create_test_event(&stream_id, Version::first(), "SwapTradeCreated");

        let version = store.start_stream(vec![event]).await.unwrap();
        assert_eq!(version, Version::first());

        let events = store.read_stream(&stream_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "SwapTradeCreated");
    }

    #[tokio::test]
    async fn start_stream_twice_fails_with_duplicate() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");

        store
            .start_stream(vec![create_test_event(
                &stream_id,
                Version::first(),
                "SwapTradeCreated",
            )])
            .await
            .unwrap();

        let result = store
            .start_stream(vec![create_test_event(
                &stream_id,
                Version::first(),
                "SwapTradeCreated",
            )])
            .await;

        assert!(matches!(result, Err(EventStoreError::DuplicateStream(id)) if id == stream_id));
    }

    #[tokio::test]
    async fn start_stream_rejects_nonfirst_version() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");

        let result = store
            .start_stream(vec![create_test_event(
                &stream_id,
                Version::new(2),
                "SwapTradeCreated",
            )])
            .await;

        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
    }

    #[tokio::test]
    async fn append_to_missing_stream_fails() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");
        let event = create_test_event(&stream_id, Version::first(), "TradePriced");

        let result = store.append(vec![event], AppendOptions::new()).await;
        assert!(matches!(result, Err(EventStoreError::StreamNotFound(id)) if id == stream_id));
    }

    #[tokio::test]
    async fn append_with_matching_expected_version_succeeds() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");

        store
            .start_stream(vec![create_test_event(
                &stream_id,
                Version::first(),
                "SwapTradeCreated",
            )])
            .await
            .unwrap();

        let result = store
            .append(
                vec![create_test_event(&stream_id, Version::new(2), "TradePriced")],
                AppendOptions::expect_version(Version::first()),
            )
            .await;

        assert_eq!(result.unwrap(), Version::new(2));
    }

    #[tokio::test]
    async fn append_with_stale_expected_version_conflicts() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");

        store
            .start_stream(vec![create_test_event(
                &stream_id,
                Version::first(),
                "SwapTradeCreated",
            )])
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(&stream_id, Version::new(2), "TradePriced")],
                AppendOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        // A second writer that loaded at version 1 must lose.
        let result = store
            .append(
                vec![create_test_event(&stream_id, Version::new(2), "TradePriced")],
                AppendOptions::expect_version(Version::first()),
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn read_stream_preserves_append_order() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");

        store
            .start_stream(vec![create_test_event(
                &stream_id,
                Version::first(),
                "SwapTradeCreated",
            )])
            .await
            .unwrap();
        for v in 2..=5 {
            store
                .append(
                    vec![create_test_event(&stream_id, Version::new(v), "TradePriced")],
                    AppendOptions::expect_version(Version::new(v - 1)),
                )
                .await
                .unwrap();
        }

        let events = store.read_stream(&stream_id).await.unwrap();
        let versions: Vec<i64> = events.iter().map(|e| e.version.as_i64()).collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn read_stream_from_version() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");

        store
            .start_stream(vec![create_test_event(
                &stream_id,
                Version::first(),
                "SwapTradeCreated",
            )])
            .await
            .unwrap();
        store
            .append(
                vec![
                    create_test_event(&stream_id, Version::new(2), "TradePriced"),
                    create_test_event(&stream_id, Version::new(3), "TradePriced"),
                ],
                AppendOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        let from_v2 = store
            .read_stream_from(&stream_id, Version::new(2))
            .await
            .unwrap();
        assert_eq!(from_v2.len(), 2);
        assert_eq!(from_v2[0].version, Version::new(2));
        assert_eq!(from_v2[1].version, Version::new(3));
    }

    #[tokio::test]
    async fn read_missing_stream_is_empty() {
        let store = InMemoryEventStore::new();
        let events = store
            .read_stream(&StreamId::generate("trade"))
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn stream_version_tracks_appends() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");

        assert_eq!(store.stream_version(&stream_id).await.unwrap(), None);

        store
            .start_stream(vec![create_test_event(
                &stream_id,
                Version::first(),
                "SwapTradeCreated",
            )])
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(&stream_id, Version::new(2), "TradePriced")],
                AppendOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        assert_eq!(
            store.stream_version(&stream_id).await.unwrap(),
            Some(Version::new(2))
        );
    }

    #[tokio::test]
    async fn stream_all_events_in_insertion_order() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        let a = StreamId::generate("trade");
        let b = StreamId::generate("trade");

        store
            .start_stream(vec![create_test_event(&a, Version::first(), "SwapTradeCreated")])
            .await
            .unwrap();
        store
            .start_stream(vec![create_test_event(&b, Version::first(), "SwapTradeCreated")])
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(&a, Version::new(2), "TradePriced")],
                AppendOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        let stream = store.stream_all_events().await.unwrap();
        let events: Vec<_> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].stream_id, a);
        assert_eq!(events[1].stream_id, b);
        assert_eq!(events[2].stream_id, a);
        assert_eq!(events[2].version, Version::new(2));
    }

    #[tokio::test]
    async fn subscription_receives_committed_events() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");
        let mut rx = store.subscribe();

        store
            .start_stream(vec![create_test_event(
                &stream_id,
                Version::first(),
                "SwapTradeCreated",
            )])
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(&stream_id, Version::new(2), "TradePriced")],
                AppendOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.version, Version::first());
        let second = rx.recv().await.unwrap();
        assert_eq!(second.version, Version::new(2));
    }

    #[tokio::test]
    async fn ext_helpers_cover_single_event_flows() {
        use crate::store::EventStoreExt;

        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");

        assert!(!store.stream_exists(&stream_id).await.unwrap());

        store
            .start_stream_with(create_test_event(
                &stream_id,
                Version::first(),
                "SwapTradeCreated",
            ))
            .await
            .unwrap();
        assert!(store.stream_exists(&stream_id).await.unwrap());

        let version = store
            .append_event(
                create_test_event(&stream_id, Version::new(2), "TradePriced"),
                AppendOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();
        assert_eq!(version, Version::new(2));

        store.clear().await;
        assert_eq!(store.event_count().await, 0);
        assert!(!store.stream_exists(&stream_id).await.unwrap());
    }

    #[tokio::test]
    async fn failed_append_publishes_nothing() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::generate("trade");
        let mut rx = store.subscribe();

        let result = store
            .append(
                vec![create_test_event(&stream_id, Version::first(), "TradePriced")],
                AppendOptions::new(),
            )
            .await;
        assert!(result.is_err());

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
