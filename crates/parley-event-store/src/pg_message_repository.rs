//! `PostgreSQL` implementation of the `MessageRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use parley_core::error::DomainError;
use parley_core::read_model::{MessageRepository, NewProjectedMessage, ProjectedMessage};

/// PostgreSQL-backed `messages` read model.
#[derive(Debug, Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new `PgMessageRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    message_id: Uuid,
    chat_id: i64,
    user_id: i64,
    text: String,
    sent_at: DateTime<Utc>,
    source_log_id: i64,
}

impl From<MessageRow> for ProjectedMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            message_id: row.message_id,
            chat_id: row.chat_id,
            user_id: row.user_id,
            text: row.text,
            sent_at: row.sent_at,
            source_log_id: row.source_log_id,
        }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    #[instrument(skip(self, message), fields(chat_id = message.chat_id, source_log_id = message.source_log_id))]
    async fn write_projection(
        &self,
        message: NewProjectedMessage,
    ) -> Result<ProjectedMessage, DomainError> {
        // The no-op update makes RETURNING yield the existing row on replay.
        let row = sqlx::query_as::<_, MessageRow>(
            r"
            INSERT INTO messages (message_id, chat_id, user_id, text, sent_at, source_log_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_log_id) DO UPDATE SET source_log_id = EXCLUDED.source_log_id
            RETURNING message_id, chat_id, user_id, text, sent_at, source_log_id
            ",
        )
        .bind(Uuid::new_v4())
        .bind(message.chat_id)
        .bind(message.user_id)
        .bind(&message.text)
        .bind(message.sent_at)
        .bind(message.source_log_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::ProjectionWrite(e.to_string()))?;

        Ok(row.into())
    }

    async fn list_by_chat(
        &self,
        chat_id: i64,
        limit: i64,
    ) -> Result<Vec<ProjectedMessage>, DomainError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r"
            SELECT message_id, chat_id, user_id, text, sent_at, source_log_id
            FROM messages
            WHERE chat_id = $1
            ORDER BY source_log_id DESC
            LIMIT $2
            ",
        )
        .bind(chat_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::StoreRead(e.to_string()))?;

        // Latest `limit` rows were selected newest first; return oldest first.
        Ok(rows.into_iter().rev().map(ProjectedMessage::from).collect())
    }
}
