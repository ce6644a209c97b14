//! Test read models — `MessageRepository` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use parley_core::error::DomainError;
use parley_core::read_model::{MessageRepository, NewProjectedMessage, ProjectedMessage};
use uuid::Uuid;

/// An in-memory `messages` table, idempotent on the source log position.
#[derive(Debug, Default)]
pub struct InMemoryMessageRepository {
    rows: Mutex<Vec<ProjectedMessage>>,
}

impl InMemoryMessageRepository {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every row, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn rows(&self) -> Vec<ProjectedMessage> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn write_projection(
        &self,
        message: NewProjectedMessage,
    ) -> Result<ProjectedMessage, DomainError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows
            .iter()
            .find(|row| row.source_log_id == message.source_log_id)
        {
            return Ok(existing.clone());
        }
        let row = ProjectedMessage {
            message_id: Uuid::new_v4(),
            chat_id: message.chat_id,
            user_id: message.user_id,
            text: message.text,
            sent_at: message.sent_at,
            source_log_id: message.source_log_id,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn list_by_chat(
        &self,
        chat_id: i64,
        limit: i64,
    ) -> Result<Vec<ProjectedMessage>, DomainError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut rows: Vec<ProjectedMessage> = self
            .rows()
            .into_iter()
            .filter(|row| row.chat_id == chat_id)
            .collect();
        rows.sort_by_key(|row| row.source_log_id);
        let start = rows.len().saturating_sub(limit);
        Ok(rows.split_off(start))
    }
}

/// A read model whose writes always fail.
#[derive(Debug)]
pub struct FailingMessageRepository;

#[async_trait]
impl MessageRepository for FailingMessageRepository {
    async fn write_projection(
        &self,
        _message: NewProjectedMessage,
    ) -> Result<ProjectedMessage, DomainError> {
        Err(DomainError::ProjectionWrite("connection refused".into()))
    }

    async fn list_by_chat(
        &self,
        _chat_id: i64,
        _limit: i64,
    ) -> Result<Vec<ProjectedMessage>, DomainError> {
        Err(DomainError::StoreRead("connection refused".into()))
    }
}
