//! Commands for the messaging context.

use uuid::Uuid;

/// Command to post a message into a chat.
#[derive(Debug, Clone)]
pub struct SendMessage {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The chat the message is posted to.
    pub chat_id: i64,
    /// The sender.
    pub user_id: i64,
    /// The message body.
    pub message_text: String,
}
