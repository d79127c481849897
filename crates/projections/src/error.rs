//! Projection error types.

use thiserror::Error;

/// Errors that can occur during projection processing.
///
/// These are internal to the query side: they are retried or logged, never
/// surfaced to the caller of the command that produced the event.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Failed to deserialize an event payload.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A projection failed to fold an event into its read model.
    #[error("Projection apply error: {0}")]
    Apply(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
