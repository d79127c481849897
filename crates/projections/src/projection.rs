//! Core projection trait.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// A projection folds events into a read model.
///
/// Projections are the mechanism by which the append-only event log is
/// transformed into denormalized rows optimized for queries. Delivery is
/// at-least-once: applying the same event twice must be a no-op in effect.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Folds a single event into the projection's read model.
    async fn apply(&self, event: &EventEnvelope) -> Result<()>;

    /// Resets the projection to its initial state, ahead of a rebuild.
    async fn reset(&self) -> Result<()>;
}
