//! Projection engine: the background consumer loop.

use std::sync::Arc;
use std::time::Duration;

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use tokio::sync::{broadcast, watch};

use crate::Result;
use crate::cursor::ProjectionCursor;
use crate::projection::Projection;

/// Attempts per event before the engine leaves it unacknowledged.
const MAX_APPLY_ATTEMPTS: u32 = 3;

/// Pause between apply attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Feeds committed events to projections, independently of the write path.
///
/// The engine first catches up from the durable log, then tails the store's
/// live subscription. Per-stream cursors make delivery idempotent under
/// at-least-once semantics: an event at or below a stream's acknowledged
/// position is skipped, and a cursor is committed only after every
/// projection applied the event. An event whose application keeps failing
/// stays unacknowledged and is redelivered by the next catch-up pass.
pub struct ProjectionEngine<S: EventStore> {
    store: S,
    projections: Vec<Arc<dyn Projection>>,
    cursors: Arc<dyn ProjectionCursor>,
}

impl<S: EventStore> ProjectionEngine<S> {
    /// Creates a new engine over the given store and cursor store.
    pub fn new(store: S, cursors: Arc<dyn ProjectionCursor>) -> Self {
        Self {
            store,
            projections: Vec::new(),
            cursors,
        }
    }

    /// Registers a projection with this engine.
    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Replays the durable log, delivering everything beyond the cursors.
    #[tracing::instrument(skip(self))]
    pub async fn catch_up(&self) -> Result<()> {
        let mut stream = self.store.stream_all_events().await?;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            if self.deliver(&event).await? {
                delivered += 1;
            }
        }

        tracing::info!(events_delivered = delivered, "catch-up complete");
        Ok(())
    }

    /// Resets every projection, releases the cursors and replays the log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.cursors.clear().await;
        self.catch_up().await
    }

    /// Runs the consumer loop until shutdown is signalled.
    ///
    /// Shutdown is graceful: the event being applied finishes and its cursor
    /// is committed before the loop exits. Subscription lag is recovered by
    /// re-reading the log instead of dropping events.
    #[tracing::instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        // Subscribe before catching up so nothing appended in between is
        // missed; anything seen twice is absorbed by the cursors.
        let mut feed = self.store.subscribe();
        self.catch_up().await?;

        tracing::info!(
            projections = self.projection_count(),
            "projection engine running"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("projection engine shutting down");
                    break;
                }
                received = feed.recv() => match received {
                    Ok(event) => {
                        if let Err(e) = self.deliver(&event).await {
                            // Leave the event unacknowledged; a catch-up pass
                            // redelivers it after a pause.
                            tracing::error!(
                                error = %e,
                                stream_id = %event.stream_id,
                                version = %event.version,
                                "projection apply failed, scheduling redelivery"
                            );
                            tokio::time::sleep(RETRY_BACKOFF).await;
                            if let Err(e) = self.catch_up().await {
                                tracing::error!(error = %e, "redelivery catch-up failed");
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "subscription lagged, catching up from log");
                        self.catch_up().await?;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("event feed closed");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Delivers one event to every projection and commits the cursor.
    ///
    /// Returns false when the event was already acknowledged and skipped.
    async fn deliver(&self, event: &EventEnvelope) -> Result<bool> {
        if let Some(position) = self.cursors.position(&event.stream_id).await
            && event.version <= position
        {
            return Ok(false);
        }

        for projection in &self.projections {
            self.apply_with_retry(projection.as_ref(), event).await?;
        }

        self.cursors.commit(&event.stream_id, event.version).await;
        metrics::counter!("projection_events_applied_total").increment(1);
        Ok(true)
    }

    async fn apply_with_retry(&self, projection: &dyn Projection, event: &EventEnvelope) -> Result<()> {
        let mut attempt = 1;
        loop {
            match projection.apply(event).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_APPLY_ATTEMPTS => {
                    tracing::warn!(
                        error = %e,
                        projection = projection.name(),
                        attempt,
                        "projection apply retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
