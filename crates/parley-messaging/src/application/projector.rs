//! Message projector.
//!
//! Subscribes to confirmed `incoming-message` events, re-reads the canonical
//! event from the log, writes the `messages` read model and publishes
//! `message-projected`. The notification itself is only trusted as a pointer
//! to a log position; its payload is never projected.
//!
//! Failures abandon the attempt: nothing is retried and no event is published.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::bus::{EventBus, EventHandler, Topic};
use parley_core::clock::Clock;
use parley_core::error::DomainError;
use parley_core::event::{CausalContext, DomainEvent};
use parley_core::read_model::{MessageRepository, NewProjectedMessage, ProjectedMessage};
use parley_core::store::{EventStore, StoredEvent};
use tracing::{error, info, instrument};

use crate::domain::events::{
    INCOMING_MESSAGE, IncomingMessage, MESSAGE_PROJECTED, MessageProjected, from_payload,
    to_payload,
};

/// Projects `incoming-message` events into the message read model.
pub struct MessageProjector {
    store: Arc<dyn EventStore>,
    messages: Arc<dyn MessageRepository>,
    clock: Arc<dyn Clock>,
}

impl MessageProjector {
    /// Creates a projector reading from `store` and writing to `messages`.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        messages: Arc<dyn MessageRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            messages,
            clock,
        }
    }

    /// Subscribes the projector to the guaranteed phase of `incoming-message`.
    pub fn register(self: Arc<Self>, bus: &EventBus) {
        bus.subscribe(Topic::guaranteed(INCOMING_MESSAGE), self);
    }

    /// Runs one projection for a confirmed notification and returns the
    /// published `message-projected` event.
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation` if `event` carries no log position.
    /// - `DomainError::ProjectionSourceMissing` if the log has no event there.
    /// - `DomainError::ProjectionTypeMismatch` if the stored event is not an
    ///   `incoming-message`.
    /// - `DomainError::ProjectionWrite` if the read-model write fails.
    /// - The bus error if `message-projected` could not be logged.
    #[instrument(skip(self, event, bus), fields(event_id = %event.event_id(), log_id = event.log_id()))]
    pub async fn project(
        &self,
        event: &DomainEvent,
        bus: &EventBus,
    ) -> Result<DomainEvent, DomainError> {
        let log_id = event.log_id().ok_or_else(|| {
            DomainError::Validation(format!("event {} has no log position", event.event_id()))
        })?;

        let source = self
            .store
            .fetch_by_log_id(log_id)
            .await?
            .ok_or(DomainError::ProjectionSourceMissing(log_id))?;

        let row = apply_projection(&source, self.messages.as_ref()).await?;

        let projected = DomainEvent::new(
            MESSAGE_PROJECTED,
            to_payload(&MessageProjected::from(&row)),
            CausalContext {
                correlation_id: Some(source.correlation_id),
                causation_id: Some(source.event_id),
            },
            self.clock.as_ref(),
        );
        let projected = bus.publish(projected).await?;

        info!(
            message_id = %row.message_id,
            chat_id = row.chat_id,
            projected_event_id = %projected.event_id(),
            "message projected"
        );
        Ok(projected)
    }
}

#[async_trait]
impl EventHandler for MessageProjector {
    async fn handle(&self, event: &DomainEvent, bus: &EventBus) -> Result<(), DomainError> {
        match self.project(event, bus).await {
            Ok(_) => Ok(()),
            Err(
                err @ (DomainError::ProjectionSourceMissing(_)
                | DomainError::ProjectionTypeMismatch { .. }),
            ) => {
                error!(
                    error = %err,
                    correlation_id = %event.metadata().correlation_id,
                    "event log inconsistent with confirmed notification, projection abandoned"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn name(&self) -> &'static str {
        "MessageProjector"
    }
}

/// Validates a logged event and writes its read-model row.
///
/// Shared by live projection and replay so both produce the same rows.
pub(crate) async fn apply_projection(
    source: &StoredEvent,
    messages: &dyn MessageRepository,
) -> Result<ProjectedMessage, DomainError> {
    if source.event_type != INCOMING_MESSAGE {
        return Err(DomainError::ProjectionTypeMismatch {
            log_id: source.log_id,
            expected: INCOMING_MESSAGE.to_owned(),
            actual: source.event_type.clone(),
        });
    }

    let message: IncomingMessage = from_payload(INCOMING_MESSAGE, &source.payload)?;

    messages
        .write_projection(NewProjectedMessage {
            chat_id: message.chat_id,
            user_id: message.user_id,
            text: message.message_text,
            sent_at: source.occurred_at,
            source_log_id: source.log_id,
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use parley_core::bus::EventBus;
    use parley_core::error::DomainError;
    use parley_core::event::{CausalContext, DomainEvent};
    use parley_core::store::StoredEvent;
    use parley_test_support::{
        FailingMessageRepository, FixedClock, InMemoryEventStore, InMemoryMessageRepository,
        RecordingHandler,
    };
    use serde_json::json;
    use uuid::Uuid;

    use super::MessageProjector;

    struct Fixture {
        store: Arc<InMemoryEventStore>,
        messages: Arc<InMemoryMessageRepository>,
        bus: EventBus,
        projected: Arc<RecordingHandler>,
    }

    fn fixture(store: InMemoryEventStore) -> Fixture {
        let store = Arc::new(store);
        let messages = Arc::new(InMemoryMessageRepository::new());
        let bus = EventBus::new(store.clone());
        let projected = Arc::new(RecordingHandler::new());
        bus.subscribe("message-projected", projected.clone());
        Fixture {
            store,
            messages,
            bus,
            projected,
        }
    }

    fn projector(fixture: &Fixture) -> MessageProjector {
        MessageProjector::new(
            fixture.store.clone(),
            fixture.messages.clone(),
            Arc::new(FixedClock::default()),
        )
    }

    fn incoming(text: &str) -> DomainEvent {
        DomainEvent::new(
            "incoming-message",
            json!({"chatId": 1, "userId": 7, "messageText": text}),
            CausalContext::root(),
            &FixedClock::default(),
        )
    }

    #[tokio::test]
    async fn test_project_writes_row_and_publishes_causally_linked_event() {
        // Arrange
        let fixture = fixture(InMemoryEventStore::starting_at(42));
        let confirmed = fixture.bus.publish(incoming("hi")).await.unwrap();

        // Act
        let projected = projector(&fixture)
            .project(&confirmed, &fixture.bus)
            .await
            .unwrap();

        // Assert
        let rows = fixture.messages.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].chat_id, 1);
        assert_eq!(rows[0].user_id, 7);
        assert_eq!(rows[0].text, "hi");
        assert_eq!(rows[0].source_log_id, 42);

        assert_eq!(projected.event_type(), "message-projected-KAFKED");
        assert_eq!(projected.metadata().causation_id, Some(confirmed.event_id()));
        assert_eq!(
            projected.metadata().correlation_id,
            confirmed.metadata().correlation_id
        );
        assert_eq!(projected.payload()["messageText"], "hi");
        assert_eq!(projected.payload()["sourceLogId"], 42);

        assert_eq!(fixture.projected.received().len(), 1);
    }

    #[tokio::test]
    async fn test_project_uses_logged_payload_not_notification_copy() {
        // Arrange
        let fixture = fixture(InMemoryEventStore::new());
        let confirmed = fixture.bus.publish(incoming("logged text")).await.unwrap();
        let log_id = confirmed.log_id().unwrap();
        let stored = fixture.store.rows()[0].clone();

        // A second store holding different content at the same position
        // stands in for a notification whose live payload drifted.
        let drifted = Arc::new(InMemoryEventStore::new());
        drifted.seed(StoredEvent {
            payload: json!({"chatId": 1, "userId": 7, "messageText": "canonical"}),
            ..stored
        });
        let projector = MessageProjector::new(
            drifted,
            fixture.messages.clone(),
            Arc::new(FixedClock::default()),
        );

        // Act
        projector.project(&confirmed, &fixture.bus).await.unwrap();

        // Assert
        let rows = fixture.messages.rows();
        assert_eq!(rows[0].text, "canonical");
        assert_eq!(rows[0].source_log_id, log_id);
    }

    #[tokio::test]
    async fn test_project_abandons_when_source_missing() {
        // Arrange
        let fixture = fixture(InMemoryEventStore::starting_at(42));
        let confirmed = fixture.bus.publish(incoming("hi")).await.unwrap();
        let projector = MessageProjector::new(
            Arc::new(InMemoryEventStore::new()),
            fixture.messages.clone(),
            Arc::new(FixedClock::default()),
        );

        // Act
        let result = projector.project(&confirmed, &fixture.bus).await;

        // Assert
        match result {
            Err(DomainError::ProjectionSourceMissing(log_id)) => assert_eq!(log_id, 42),
            other => panic!("expected ProjectionSourceMissing, got {other:?}"),
        }
        assert!(fixture.messages.rows().is_empty());
        assert!(fixture.projected.received().is_empty());
    }

    #[tokio::test]
    async fn test_project_abandons_on_type_mismatch() {
        // Arrange
        let fixture = fixture(InMemoryEventStore::new());
        let confirmed = fixture.bus.publish(incoming("hi")).await.unwrap();
        let mismatched = Arc::new(InMemoryEventStore::new());
        mismatched.seed(StoredEvent {
            log_id: confirmed.log_id().unwrap(),
            event_id: Uuid::new_v4(),
            event_type: "user-joined".to_owned(),
            payload: json!({}),
            correlation_id: Uuid::new_v4(),
            causation_id: None,
            occurred_at: Utc::now(),
            stored_at: Utc::now(),
        });
        let projector = MessageProjector::new(
            mismatched,
            fixture.messages.clone(),
            Arc::new(FixedClock::default()),
        );

        // Act
        let result = projector.project(&confirmed, &fixture.bus).await;

        // Assert
        match result {
            Err(DomainError::ProjectionTypeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, "incoming-message");
                assert_eq!(actual, "user-joined");
            }
            other => panic!("expected ProjectionTypeMismatch, got {other:?}"),
        }
        assert!(fixture.messages.rows().is_empty());
        assert!(fixture.projected.received().is_empty());
    }

    #[tokio::test]
    async fn test_project_abandons_when_read_model_write_fails() {
        // Arrange
        let fixture = fixture(InMemoryEventStore::new());
        let confirmed = fixture.bus.publish(incoming("hi")).await.unwrap();
        let projector = MessageProjector::new(
            fixture.store.clone(),
            Arc::new(FailingMessageRepository),
            Arc::new(FixedClock::default()),
        );

        // Act
        let result = projector.project(&confirmed, &fixture.bus).await;

        // Assert
        assert!(matches!(result, Err(DomainError::ProjectionWrite(_))));
        assert!(fixture.projected.received().is_empty());
        assert_eq!(fixture.store.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_project_rejects_unconfirmed_event() {
        let fixture = fixture(InMemoryEventStore::new());

        let result = projector(&fixture)
            .project(&incoming("hi"), &fixture.bus)
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(fixture.messages.rows().is_empty());
    }
}
