//! Chat message read model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DomainError;

/// A projection to be written, derived from one logged event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProjectedMessage {
    /// Chat the message belongs to.
    pub chat_id: i64,
    /// Sender.
    pub user_id: i64,
    /// Message body.
    pub text: String,
    /// Creation time of the source event.
    pub sent_at: DateTime<Utc>,
    /// Log position of the source event.
    pub source_log_id: i64,
}

/// A denormalized message row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectedMessage {
    /// Row identifier.
    pub message_id: Uuid,
    /// Chat the message belongs to.
    pub chat_id: i64,
    /// Sender.
    pub user_id: i64,
    /// Message body.
    pub text: String,
    /// Creation time of the source event.
    pub sent_at: DateTime<Utc>,
    /// Log position of the source event.
    pub source_log_id: i64,
}

/// Read-model table owned by the message projector.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Writes the row for `message`.
    ///
    /// Writing the same `source_log_id` twice returns the existing row, which
    /// keeps replays from duplicating messages.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ProjectionWrite` if the row cannot be written.
    async fn write_projection(
        &self,
        message: NewProjectedMessage,
    ) -> Result<ProjectedMessage, DomainError>;

    /// Lists the latest `limit` messages of a chat, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreRead` if the table cannot be read.
    async fn list_by_chat(
        &self,
        chat_id: i64,
        limit: i64,
    ) -> Result<Vec<ProjectedMessage>, DomainError>;
}
