use std::collections::HashMap;

use async_trait::async_trait;
use common::StreamId;
use sqlx::{PgPool, Row, postgres::PgRow};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    EventEnvelope, EventId, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

const SUBSCRIPTION_BUFFER: usize = 1024;

/// PostgreSQL-backed event store implementation.
///
/// The event log lives in a single append-only table keyed by
/// `(stream_id, version)` with a unique constraint providing the
/// optimistic-concurrency serialization point. The live subscription feed is
/// process-local; a restarted consumer catches up from the table.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
    feed: broadcast::Sender<EventEnvelope>,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        let (feed, _) = broadcast::channel(SUBSCRIPTION_BUFFER);
        Self { pool, feed }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn publish(&self, events: &[EventEnvelope]) {
        for event in events {
            let _ = self.feed.send(event.clone());
        }
        metrics::counter!("event_store_appends_total").increment(events.len() as u64);
    }

    async fn insert_events(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        events: &[EventEnvelope],
    ) -> std::result::Result<(), sqlx::Error> {
        for event in events {
            let metadata_json = serde_json::to_value(&event.metadata)
                .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, stream_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.stream_id.as_str())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    fn is_version_conflict(err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Database(db_err) if db_err.constraint() == Some("unique_stream_version")
        )
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            stream_id: StreamId::new(row.try_get::<String, _>("stream_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
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

        let mut tx = self.pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM events WHERE stream_id = $1)")
                .bind(stream_id.as_str())
                .fetch_one(&mut *tx)
                .await?;

        if exists {
            return Err(EventStoreError::DuplicateStream(stream_id));
        }

        Self::insert_events(&mut tx, &events).await.map_err(|e| {
            // A racing creator loses on the unique constraint.
            if Self::is_version_conflict(&e) {
                EventStoreError::DuplicateStream(stream_id.clone())
            } else {
                EventStoreError::Database(e)
            }
        })?;

        tx.commit().await?;

        let last_version = events.last().map(|e| e.version).unwrap_or(Version::first());
        self.publish(&events);

        Ok(last_version)
    }

    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let stream_id = events[0].stream_id.clone();

        let mut tx = self.pool.begin().await?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE stream_id = $1")
                .bind(stream_id.as_str())
                .fetch_one(&mut *tx)
                .await?;

        let Some(current_version) = current_version.map(Version::new) else {
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

        Self::insert_events(&mut tx, &events).await.map_err(|e| {
            if Self::is_version_conflict(&e) {
                EventStoreError::ConcurrencyConflict {
                    stream_id: stream_id.clone(),
                    expected: options.expected_version.unwrap_or(current_version),
                    actual: current_version,
                }
            } else {
                EventStoreError::Database(e)
            }
        })?;

        tx.commit().await?;

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(current_version);
        self.publish(&events);

        Ok(last_version)
    }

    async fn read_stream(&self, stream_id: &StreamId) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, stream_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE stream_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(stream_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn read_stream_from(
        &self,
        stream_id: &StreamId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, stream_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE stream_id = $1 AND version >= $2
            ORDER BY version ASC
            "#,
        )
        .bind(stream_id.as_str())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_version(&self, stream_id: &StreamId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE stream_id = $1")
                .bind(stream_id.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::StreamExt;

        let stream = sqlx::query(
            r#"
            SELECT id, event_type, stream_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            ORDER BY sequence ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_event(row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.feed.subscribe()
    }
}
