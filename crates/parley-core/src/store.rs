//! Event store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::DomainEvent;

/// A durable row of the append-only event log.
///
/// Serializes with the same camelCase field names as `DomainEvent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    /// Log position assigned at append time. Unique and increasing.
    pub log_id: i64,
    /// Identifier of the event that was appended.
    pub event_id: Uuid,
    /// Type as published, without the guaranteed suffix.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub payload: serde_json::Value,
    /// Correlation ID of the chain the event belongs to.
    pub correlation_id: Uuid,
    /// Causing event, `None` for roots.
    pub causation_id: Option<Uuid>,
    /// Event creation time.
    pub occurred_at: DateTime<Utc>,
    /// Time the row was written.
    pub stored_at: DateTime<Utc>,
}

/// Append-only durable log of domain events.
///
/// Implementations must assign log positions atomically so that concurrent
/// appends never share a `log_id`. Rows are never updated or deleted.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Durably appends `event` and returns its log position.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreWrite` on I/O or constraint failure.
    async fn append(&self, event: &DomainEvent) -> Result<i64, DomainError>;

    /// Fetches the event stored at `log_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreRead` if the log cannot be read.
    async fn fetch_by_log_id(&self, log_id: i64) -> Result<Option<StoredEvent>, DomainError>;

    /// Loads up to `limit` events with a log position greater than
    /// `after_log_id`, in log order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreRead` if the log cannot be read.
    async fn load_from(
        &self,
        after_log_id: i64,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Loads every event of a correlation chain, in log order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreRead` if the log cannot be read.
    async fn load_correlation(
        &self,
        correlation_id: Uuid,
    ) -> Result<Vec<StoredEvent>, DomainError>;
}
