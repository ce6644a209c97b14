//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;

/// Wire suffix the bus appends to an event type once the event is durably logged.
pub const GUARANTEED_SUFFIX: &str = "-KAFKED";

/// Delivery phase of a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Notified before the durable append; the event may still be lost.
    Eager,
    /// Notified after the durable append committed.
    Guaranteed,
}

/// Causal links supplied when constructing an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CausalContext {
    /// Chain the event belongs to. A fresh one is generated when absent.
    pub correlation_id: Option<Uuid>,
    /// Event that directly caused this one. `None` for roots.
    pub causation_id: Option<Uuid>,
}

impl CausalContext {
    /// Context for the first event of a new interaction.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Root context that joins an existing correlation chain.
    #[must_use]
    pub fn correlated(correlation_id: Uuid) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            causation_id: None,
        }
    }

    /// Context for an event caused by `cause`.
    #[must_use]
    pub fn caused_by(cause: &DomainEvent) -> Self {
        Self {
            correlation_id: Some(cause.metadata.correlation_id),
            causation_id: Some(cause.event_id),
        }
    }
}

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Groups every event of one originating interaction.
    pub correlation_id: Uuid,
    /// Event id of the directly preceding event in the chain.
    pub causation_id: Option<Uuid>,
    /// Log position assigned by the event store. Absent until confirmed.
    pub log_id: Option<i64>,
}

/// An immutable record of a fact.
///
/// The only mutation an event ever sees is its promotion by the bus after a
/// successful append, which suffixes the type and sets `log_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    event_id: Uuid,
    #[serde(rename = "type")]
    event_type: String,
    payload: serde_json::Value,
    metadata: EventMetadata,
}

impl DomainEvent {
    /// Builds a new event with a fresh id and the clock's current time.
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        payload: serde_json::Value,
        context: CausalContext,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            payload,
            metadata: EventMetadata {
                timestamp: clock.now(),
                correlation_id: context.correlation_id.unwrap_or_else(Uuid::new_v4),
                causation_id: context.causation_id,
                log_id: None,
            },
        }
    }

    /// Globally unique event identifier.
    #[must_use]
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// The wire-level type, including the guaranteed suffix once promoted.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The type without the guaranteed suffix.
    #[must_use]
    pub fn base_type(&self) -> &str {
        self.event_type
            .strip_suffix(GUARANTEED_SUFFIX)
            .unwrap_or(&self.event_type)
    }

    /// Event-specific data, opaque to the bus.
    #[must_use]
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Timestamp and causal links.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Log position, present only on confirmed events.
    #[must_use]
    pub fn log_id(&self) -> Option<i64> {
        self.metadata.log_id
    }

    /// Which notification phase this instance belongs to.
    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.metadata.log_id.is_some() {
            Phase::Guaranteed
        } else {
            Phase::Eager
        }
    }

    /// Whether the type string already carries the guaranteed suffix.
    pub(crate) fn has_guaranteed_suffix(&self) -> bool {
        self.event_type.ends_with(GUARANTEED_SUFFIX)
    }

    /// Marks the event as durably logged at `log_id`.
    pub(crate) fn promote(&mut self, log_id: i64) {
        self.event_type.push_str(GUARANTEED_SUFFIX);
        self.metadata.log_id = Some(log_id);
    }
}
