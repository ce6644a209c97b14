//! Test event stores — `EventStore` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use parley_core::error::DomainError;
use parley_core::event::DomainEvent;
use parley_core::store::{EventStore, StoredEvent};
use uuid::Uuid;

/// An in-memory append-only log. Log positions are assigned sequentially
/// under a mutex, starting at the configured first position.
#[derive(Debug)]
pub struct InMemoryEventStore {
    state: Mutex<LogState>,
}

#[derive(Debug)]
struct LogState {
    next_log_id: i64,
    rows: Vec<StoredEvent>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    /// Creates an empty log whose first append gets log position 1.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates an empty log whose first append gets `first_log_id`.
    #[must_use]
    pub fn starting_at(first_log_id: i64) -> Self {
        Self {
            state: Mutex::new(LogState {
                next_log_id: first_log_id,
                rows: Vec::new(),
            }),
        }
    }

    /// Inserts a row directly, bypassing the bus. Used to stage anomalies
    /// such as a log position holding an unexpected event type.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seed(&self, row: StoredEvent) {
        let mut state = self.state.lock().unwrap();
        state.next_log_id = state.next_log_id.max(row.log_id + 1);
        state.rows.push(row);
    }

    /// Returns a snapshot of every stored row, in log order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn rows(&self) -> Vec<StoredEvent> {
        let mut rows = self.state.lock().unwrap().rows.clone();
        rows.sort_by_key(|row| row.log_id);
        rows
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: &DomainEvent) -> Result<i64, DomainError> {
        let mut state = self.state.lock().unwrap();
        if state.rows.iter().any(|row| row.event_id == event.event_id()) {
            return Err(DomainError::StoreWrite(format!(
                "duplicate event id {}",
                event.event_id()
            )));
        }
        let log_id = state.next_log_id;
        state.next_log_id += 1;
        let metadata = event.metadata();
        state.rows.push(StoredEvent {
            log_id,
            event_id: event.event_id(),
            event_type: event.event_type().to_owned(),
            payload: event.payload().clone(),
            correlation_id: metadata.correlation_id,
            causation_id: metadata.causation_id,
            occurred_at: metadata.timestamp,
            stored_at: metadata.timestamp,
        });
        Ok(log_id)
    }

    async fn fetch_by_log_id(&self, log_id: i64) -> Result<Option<StoredEvent>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state.rows.iter().find(|row| row.log_id == log_id).cloned())
    }

    async fn load_from(
        &self,
        after_log_id: i64,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .rows()
            .into_iter()
            .filter(|row| row.log_id > after_log_id)
            .take(limit)
            .collect())
    }

    async fn load_correlation(
        &self,
        correlation_id: Uuid,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .rows()
            .into_iter()
            .filter(|row| row.correlation_id == correlation_id)
            .collect())
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(&self, _event: &DomainEvent) -> Result<i64, DomainError> {
        Err(DomainError::StoreWrite("connection refused".into()))
    }

    async fn fetch_by_log_id(&self, _log_id: i64) -> Result<Option<StoredEvent>, DomainError> {
        Err(DomainError::StoreRead("connection refused".into()))
    }

    async fn load_from(
        &self,
        _after_log_id: i64,
        _limit: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::StoreRead("connection refused".into()))
    }

    async fn load_correlation(
        &self,
        _correlation_id: Uuid,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::StoreRead("connection refused".into()))
    }
}
