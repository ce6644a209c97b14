//! Domain events for the messaging context.
//!
//! Type names are part of the wire contract with existing consumers and must
//! not change.

use chrono::{DateTime, Utc};
use parley_core::error::DomainError;
use parley_core::read_model::ProjectedMessage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A participant posted a message. Produced by the connection gateway.
pub const INCOMING_MESSAGE: &str = "incoming-message";

/// A message was written to the read model. Produced by the projector.
pub const MESSAGE_PROJECTED: &str = "message-projected";

/// Payload of `incoming-message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    /// The chat the message is posted to.
    pub chat_id: i64,
    /// The sender.
    pub user_id: i64,
    /// The message body.
    pub message_text: String,
}

/// Payload of `message-projected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageProjected {
    /// Read-model row identifier.
    pub message_id: Uuid,
    /// The chat the message belongs to.
    pub chat_id: i64,
    /// The sender.
    pub user_id: i64,
    /// The message body.
    pub message_text: String,
    /// Creation time of the source event.
    pub sent_at: DateTime<Utc>,
    /// Log position of the source `incoming-message`.
    pub source_log_id: i64,
}

impl From<&ProjectedMessage> for MessageProjected {
    fn from(row: &ProjectedMessage) -> Self {
        Self {
            message_id: row.message_id,
            chat_id: row.chat_id,
            user_id: row.user_id,
            message_text: row.text.clone(),
            sent_at: row.sent_at,
            source_log_id: row.source_log_id,
        }
    }
}

/// Serializes a payload struct for a `DomainEvent`.
///
/// # Panics
///
/// Panics if `T`'s `Serialize` implementation fails, which the payload
/// structs of this module never do.
pub fn to_payload<T: Serialize>(payload: &T) -> serde_json::Value {
    serde_json::to_value(payload).expect("event payload serialization is infallible")
}

/// Decodes an event payload.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the payload does not match `T`.
pub fn from_payload<T: DeserializeOwned>(
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<T, DomainError> {
    T::deserialize(payload)
        .map_err(|e| DomainError::Validation(format!("malformed {event_type} payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_incoming_message_uses_camel_case_wire_fields() {
        let payload = to_payload(&IncomingMessage {
            chat_id: 1,
            user_id: 7,
            message_text: "hi".to_owned(),
        });

        assert_eq!(payload, json!({"chatId": 1, "userId": 7, "messageText": "hi"}));
    }

    #[test]
    fn test_from_payload_rejects_missing_fields() {
        let result: Result<IncomingMessage, _> =
            from_payload(INCOMING_MESSAGE, &json!({"chatId": 1}));

        match result {
            Err(DomainError::Validation(message)) => {
                assert!(message.starts_with("malformed incoming-message payload"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
