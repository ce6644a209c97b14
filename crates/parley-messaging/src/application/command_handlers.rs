//! Command handlers for the messaging context.
//!
//! These stand in for the connection gateway: they turn a client request into
//! an `incoming-message` event and publish it on the bus.

use parley_core::bus::EventBus;
use parley_core::clock::Clock;
use parley_core::error::DomainError;
use parley_core::event::{CausalContext, DomainEvent};
use tracing::{info, instrument};

use crate::domain::commands::SendMessage;
use crate::domain::events::{INCOMING_MESSAGE, IncomingMessage, to_payload};

/// Handles the `SendMessage` command: builds the root `incoming-message`
/// event and publishes it.
///
/// Returns the confirmed event, carrying its log position.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty message, and
/// `DomainError::StoreWrite` if the event could not be durably logged.
#[instrument(skip(command, clock, bus), fields(chat_id = command.chat_id, correlation_id = %command.correlation_id))]
pub async fn handle_send_message(
    command: &SendMessage,
    clock: &dyn Clock,
    bus: &EventBus,
) -> Result<DomainEvent, DomainError> {
    if command.message_text.trim().is_empty() {
        return Err(DomainError::Validation(
            "message_text must not be empty".to_owned(),
        ));
    }

    let payload = to_payload(&IncomingMessage {
        chat_id: command.chat_id,
        user_id: command.user_id,
        message_text: command.message_text.clone(),
    });
    let event = DomainEvent::new(
        INCOMING_MESSAGE,
        payload,
        CausalContext::correlated(command.correlation_id),
        clock,
    );

    let confirmed = bus.publish(event).await?;
    info!(
        event_id = %confirmed.event_id(),
        log_id = confirmed.log_id(),
        "incoming message confirmed"
    );
    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parley_core::bus::EventBus;
    use parley_core::error::DomainError;
    use parley_test_support::{FailingEventStore, FixedClock, InMemoryEventStore, RecordingHandler};
    use serde_json::json;
    use uuid::Uuid;

    use crate::application::command_handlers::handle_send_message;
    use crate::domain::commands::SendMessage;

    fn command(text: &str) -> SendMessage {
        SendMessage {
            correlation_id: Uuid::new_v4(),
            chat_id: 1,
            user_id: 7,
            message_text: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_handle_send_message_publishes_confirmed_incoming_message() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::starting_at(42));
        let bus = EventBus::new(store.clone());
        let eager = Arc::new(RecordingHandler::new());
        bus.subscribe("incoming-message", eager.clone());
        let clock = FixedClock::default();
        let command = command("hi");

        // Act
        let confirmed = handle_send_message(&command, &clock, &bus).await.unwrap();

        // Assert
        assert_eq!(confirmed.event_type(), "incoming-message-KAFKED");
        assert_eq!(confirmed.log_id(), Some(42));
        assert_eq!(confirmed.metadata().correlation_id, command.correlation_id);
        assert!(confirmed.metadata().causation_id.is_none());
        assert_eq!(confirmed.metadata().timestamp, clock.0);

        let received = eager.received();
        assert_eq!(received.len(), 1);
        assert_eq!(
            *received[0].payload(),
            json!({"chatId": 1, "userId": 7, "messageText": "hi"})
        );

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "incoming-message");
    }

    #[tokio::test]
    async fn test_handle_send_message_rejects_blank_text_without_publishing() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let bus = EventBus::new(store.clone());
        let eager = Arc::new(RecordingHandler::new());
        bus.subscribe("incoming-message", eager.clone());

        // Act
        let result = handle_send_message(&command("   "), &FixedClock::default(), &bus).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(eager.received().is_empty());
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_handle_send_message_surfaces_store_write_error() {
        let bus = EventBus::new(Arc::new(FailingEventStore));

        let result = handle_send_message(&command("hi"), &FixedClock::default(), &bus).await;

        assert!(matches!(result, Err(DomainError::StoreWrite(_))));
    }
}
