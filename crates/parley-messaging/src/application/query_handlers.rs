//! Query handlers for the messaging context.
//!
//! Chat history comes from the read model. Event lookups and causal chains
//! come straight from the log.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parley_core::error::DomainError;
use parley_core::read_model::MessageRepository;
use parley_core::store::{EventStore, StoredEvent};
use serde::Serialize;
use uuid::Uuid;

/// Largest page a history query may request.
pub const MAX_HISTORY_LIMIT: i64 = 500;

/// Read-only view of one chat message.
#[derive(Debug, Serialize)]
pub struct ChatMessageView {
    /// Read-model row identifier.
    pub message_id: Uuid,
    /// The sender.
    pub user_id: i64,
    /// The message body.
    pub text: String,
    /// Creation time of the source event.
    pub sent_at: DateTime<Utc>,
    /// Log position of the source event.
    pub log_id: i64,
}

/// Read-only view of a chat's history.
#[derive(Debug, Serialize)]
pub struct ChatHistoryView {
    /// The chat identifier.
    pub chat_id: i64,
    /// Messages, oldest first.
    pub messages: Vec<ChatMessageView>,
}

/// Every logged event of one correlation chain.
#[derive(Debug, Serialize)]
pub struct CausalChainView {
    /// The chain identifier.
    pub correlation_id: Uuid,
    /// Events in log order.
    pub events: Vec<StoredEvent>,
    /// Events whose causation ID does not resolve to an earlier event of the
    /// chain. Empty for an intact chain.
    pub broken_links: Vec<Uuid>,
}

/// Retrieves the latest `limit` messages of a chat, oldest first.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `limit` is outside
/// `1..=MAX_HISTORY_LIMIT`, and `DomainError::StoreRead` if the read model
/// cannot be read.
pub async fn get_chat_history(
    chat_id: i64,
    limit: i64,
    repo: &dyn MessageRepository,
) -> Result<ChatHistoryView, DomainError> {
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(DomainError::Validation(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    let messages = repo
        .list_by_chat(chat_id, limit)
        .await?
        .into_iter()
        .map(|row| ChatMessageView {
            message_id: row.message_id,
            user_id: row.user_id,
            text: row.text,
            sent_at: row.sent_at,
            log_id: row.source_log_id,
        })
        .collect();

    Ok(ChatHistoryView { chat_id, messages })
}

/// Retrieves the canonical event stored at `log_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the log has no event there.
pub async fn get_event_by_log_id(
    log_id: i64,
    store: &dyn EventStore,
) -> Result<StoredEvent, DomainError> {
    store
        .fetch_by_log_id(log_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("event at log position {log_id}")))
}

/// Reconstructs the chain of events sharing `correlation_id` and checks that
/// every causation link resolves to an earlier event of the same chain.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no event carries the correlation ID.
pub async fn get_causal_chain(
    correlation_id: Uuid,
    store: &dyn EventStore,
) -> Result<CausalChainView, DomainError> {
    let events = store.load_correlation(correlation_id).await?;
    if events.is_empty() {
        return Err(DomainError::NotFound(format!(
            "correlation chain {correlation_id}"
        )));
    }

    let mut seen = HashSet::with_capacity(events.len());
    let mut broken_links = Vec::new();
    for event in &events {
        if let Some(cause) = event.causation_id {
            if !seen.contains(&cause) {
                broken_links.push(event.event_id);
            }
        }
        seen.insert(event.event_id);
    }

    Ok(CausalChainView {
        correlation_id,
        events,
        broken_links,
    })
}
