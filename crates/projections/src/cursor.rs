//! Per-stream projection cursors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::StreamId;
use event_store::Version;
use tokio::sync::RwLock;

/// The last durably-acknowledged position per stream.
///
/// The engine commits a stream's cursor only after every registered
/// projection has applied the event; anything at or below the cursor is
/// treated as already processed and skipped on redelivery.
#[async_trait]
pub trait ProjectionCursor: Send + Sync {
    /// Returns the acknowledged position for a stream, if any.
    async fn position(&self, stream_id: &StreamId) -> Option<Version>;

    /// Acknowledges a stream position. Never moves a cursor backwards.
    async fn commit(&self, stream_id: &StreamId, version: Version);

    /// Releases all cursors (used when rebuilding from scratch).
    async fn clear(&self);
}

/// In-memory cursor store.
///
/// Positions vanish on restart, which is sound: the catch-up pass re-reads
/// the log from the start and idempotent projections absorb the redelivery.
/// A durable implementation can be swapped in behind the same trait.
#[derive(Clone, Default)]
pub struct InMemoryCursorStore {
    positions: Arc<RwLock<HashMap<StreamId, Version>>>,
}

impl InMemoryCursorStore {
    /// Creates an empty cursor store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectionCursor for InMemoryCursorStore {
    async fn position(&self, stream_id: &StreamId) -> Option<Version> {
        self.positions.read().await.get(stream_id).copied()
    }

    async fn commit(&self, stream_id: &StreamId, version: Version) {
        let mut positions = self.positions.write().await;
        let entry = positions.entry(stream_id.clone()).or_insert(version);
        if version > *entry {
            *entry = version;
        }
    }

    async fn clear(&self) {
        self.positions.write().await.clear();
    }
}
