//! Test handlers — `EventHandler` implementations that record deliveries.

use std::sync::Mutex;

use async_trait::async_trait;
use parley_core::bus::{EventBus, EventHandler};
use parley_core::error::DomainError;
use parley_core::event::DomainEvent;

/// A handler that keeps a copy of every event it receives.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    received: Mutex<Vec<DomainEvent>>,
}

impl RecordingHandler {
    /// Creates a handler with an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the received events, in delivery order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn received(&self) -> Vec<DomainEvent> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &DomainEvent, _bus: &EventBus) -> Result<(), DomainError> {
        self.received.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RecordingHandler"
    }
}

/// A handler that always fails.
#[derive(Debug)]
pub struct FailingHandler;

#[async_trait]
impl EventHandler for FailingHandler {
    async fn handle(&self, _event: &DomainEvent, _bus: &EventBus) -> Result<(), DomainError> {
        Err(DomainError::Validation("handler rejected event".into()))
    }

    fn name(&self) -> &'static str {
        "FailingHandler"
    }
}
