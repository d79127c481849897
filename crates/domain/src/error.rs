//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::trade::TradeError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A trade command was rejected.
    #[error("Trade error: {0}")]
    Trade(TradeError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if this error is an optimistic-concurrency conflict,
    /// in which case the caller should re-read and retry.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. })
        )
    }
}

impl From<TradeError> for DomainError {
    fn from(e: TradeError) -> Self {
        DomainError::Trade(e)
    }
}
