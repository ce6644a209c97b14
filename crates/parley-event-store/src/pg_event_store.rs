//! `PostgreSQL` implementation of the `EventStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use parley_core::error::DomainError;
use parley_core::event::DomainEvent;
use parley_core::store::{EventStore, StoredEvent};

/// PostgreSQL-backed append-only event log.
///
/// `log_id` comes from a `BIGSERIAL`, so each append is assigned its position
/// atomically by the insert that writes it.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    log_id: i64,
    event_id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    correlation_id: Uuid,
    causation_id: Option<Uuid>,
    occurred_at: DateTime<Utc>,
    stored_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            log_id: row.log_id,
            event_id: row.event_id,
            event_type: row.event_type,
            payload: row.payload,
            correlation_id: row.correlation_id,
            causation_id: row.causation_id,
            occurred_at: row.occurred_at,
            stored_at: row.stored_at,
        }
    }
}

fn read_error(err: &sqlx::Error) -> DomainError {
    DomainError::StoreRead(err.to_string())
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self, event), fields(event_id = %event.event_id()))]
    async fn append(&self, event: &DomainEvent) -> Result<i64, DomainError> {
        let metadata = event.metadata();
        let log_id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO event_log
                (event_id, event_type, payload, correlation_id, causation_id, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING log_id
            ",
        )
        .bind(event.event_id())
        .bind(event.event_type())
        .bind(event.payload())
        .bind(metadata.correlation_id)
        .bind(metadata.causation_id)
        .bind(metadata.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::StoreWrite(e.to_string()))?;

        debug!(log_id, "event appended");
        Ok(log_id)
    }

    async fn fetch_by_log_id(&self, log_id: i64) -> Result<Option<StoredEvent>, DomainError> {
        let row = sqlx::query_as::<_, EventRow>(
            r"
            SELECT log_id, event_id, event_type, payload, correlation_id, causation_id,
                   occurred_at, stored_at
            FROM event_log
            WHERE log_id = $1
            ",
        )
        .bind(log_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error(&e))?;

        Ok(row.map(StoredEvent::from))
    }

    async fn load_from(
        &self,
        after_log_id: i64,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"
            SELECT log_id, event_id, event_type, payload, correlation_id, causation_id,
                   occurred_at, stored_at
            FROM event_log
            WHERE log_id > $1
            ORDER BY log_id ASC
            LIMIT $2
            ",
        )
        .bind(after_log_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_error(&e))?;

        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn load_correlation(
        &self,
        correlation_id: Uuid,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"
            SELECT log_id, event_id, event_type, payload, correlation_id, causation_id,
                   occurred_at, stored_at
            FROM event_log
            WHERE correlation_id = $1
            ORDER BY log_id ASC
            ",
        )
        .bind(correlation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_error(&e))?;

        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }
}
