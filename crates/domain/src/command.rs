//! Command handling infrastructure.

use std::marker::PhantomData;

use common::StreamId;
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};
use serde::Serialize;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the stream after the command.
    pub new_version: Version,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the stream identity this command targets.
    fn stream_id(&self) -> &StreamId;
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the aggregate by replaying its full event stream
/// 2. Executing the command to produce events
/// 3. Persisting the events with an expected-version check (optimistic
///    concurrency); the first events of a stream go through `start_stream`
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate by replaying its full event stream.
    ///
    /// If the stream doesn't exist, returns a default instance.
    pub async fn load(&self, stream_id: &StreamId) -> Result<A, DomainError> {
        let envelopes = self.store.read_stream(stream_id).await?;

        let mut aggregate = A::default();
        for envelope in envelopes {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if its stream doesn't exist.
    pub async fn load_existing(&self, stream_id: &StreamId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(stream_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error. Persistence carries the
    /// loaded version as the expected version, so a concurrent writer that
    /// appended in between fails with a concurrency conflict and must retry.
    pub async fn execute<F>(
        &self,
        stream_id: &StreamId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A::Event: Serialize,
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(stream_id).await?;
        let current_version = aggregate.version();

        // Execute command to get events
        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        // Build envelopes for persistence
        let envelopes = self.build_envelopes(stream_id, current_version, &events)?;

        // Persist with optimistic concurrency; a brand new stream is started
        // rather than appended so duplicate identities surface as such.
        let new_version = if current_version == Version::initial() {
            self.store.start_stream(envelopes).await?
        } else {
            self.store
                .append(envelopes, AppendOptions::expect_version(current_version))
                .await?
        };

        // Apply events to aggregate
        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(
        &self,
        stream_id: &StreamId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError>
    where
        A::Event: Serialize,
    {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .stream_id(stream_id.clone())
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build();
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::InMemoryEventStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Opened { name: String },
        Adjusted { value: i32 },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Opened { .. } => "TestOpened",
                TestEvent::Adjusted { .. } => "TestAdjusted",
            }
        }
    }

    #[derive(Debug, Default, Clone)]
    struct TestAggregate {
        id: Option<StreamId>,
        name: String,
        value: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("invalid value: {0}")]
        InvalidValue(i32),
    }

    impl Aggregate for TestAggregate {
        type Event = TestEvent;
        type Error = TestError;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
        }

        fn id(&self) -> Option<&StreamId> {
            self.id.as_ref()
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TestEvent::Opened { name } => {
                    if self.id.is_none() {
                        self.id = Some(StreamId::generate("test"));
                    }
                    self.name = name;
                }
                TestEvent::Adjusted { value } => {
                    self.value = value;
                }
            }
        }
    }

    impl From<TestError> for DomainError {
        fn from(e: TestError) -> Self {
            DomainError::Serialization(serde_json::Error::io(std::io::Error::other(
                e.to_string(),
            )))
        }
    }

    #[tokio::test]
    async fn test_execute_starts_stream() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store);
        let stream_id = StreamId::generate("test");

        let result = handler
            .execute(&stream_id, |_agg| {
                Ok(vec![TestEvent::Opened {
                    name: "Test".to_string(),
                }])
            })
            .await
            .unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_version, Version::first());
        assert!(result.aggregate.id().is_some());
        assert_eq!(result.aggregate.name, "Test");
    }

    #[tokio::test]
    async fn test_execute_appends_to_existing_stream() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store);
        let stream_id = StreamId::generate("test");

        handler
            .execute(&stream_id, |_| {
                Ok(vec![TestEvent::Opened {
                    name: "Test".to_string(),
                }])
            })
            .await
            .unwrap();

        let result = handler
            .execute(&stream_id, |_| Ok(vec![TestEvent::Adjusted { value: 42 }]))
            .await
            .unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.value, 42);
    }

    #[tokio::test]
    async fn test_execute_returns_error_on_invalid_command() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store);
        let stream_id = StreamId::generate("test");

        let result = handler
            .execute(&stream_id, |_| Err(TestError::InvalidValue(-1)))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rejected_command_persists_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let stream_id = StreamId::generate("test");

        let _ = handler
            .execute(&stream_id, |_| Err(TestError::InvalidValue(-1)))
            .await;

        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_load_existing_returns_none_for_new() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store);
        let stream_id = StreamId::generate("test");

        let result = handler.load_existing(&stream_id).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_load_existing_returns_some_for_existing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store);
        let stream_id = StreamId::generate("test");

        handler
            .execute(&stream_id, |_| {
                Ok(vec![TestEvent::Opened {
                    name: "Test".to_string(),
                }])
            })
            .await
            .unwrap();

        let result = handler.load_existing(&stream_id).await.unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().name, "Test");
    }

    #[tokio::test]
    async fn test_empty_events_returns_without_persisting() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let stream_id = StreamId::generate("test");

        let result = handler.execute(&stream_id, |_| Ok(vec![])).await.unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }
}
