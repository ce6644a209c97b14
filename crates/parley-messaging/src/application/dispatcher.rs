//! Message dispatcher.
//!
//! Listens to the eager phase of `message-projected`. A projected event is
//! only ever published after its read-model row was written, so waiting for
//! the bus to log the projected event itself would add latency and no safety.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parley_core::bus::{EventBus, EventHandler, Topic};
use parley_core::error::DomainError;
use parley_core::event::DomainEvent;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::events::{MESSAGE_PROJECTED, MessageProjected, from_payload};

/// Frames a connection may have queued before it is treated as gone.
pub const CONNECTION_BUFFER: usize = 64;

/// Outbound frame channel of one live connection, created with
/// `connection_channel`.
pub type ConnectionSender = mpsc::Sender<String>;

/// Creates the bounded outbound channel for one connection.
#[must_use]
pub fn connection_channel() -> (ConnectionSender, mpsc::Receiver<String>) {
    mpsc::channel(CONNECTION_BUFFER)
}

/// Tracks which live connections follow which chat.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Attaches a connection to `chat_id` and returns its identifier.
    async fn join(&self, chat_id: i64, sender: ConnectionSender) -> Uuid;

    /// Detaches a connection.
    async fn leave(&self, chat_id: i64, connection_id: Uuid);

    /// Sends `frame` to every connection following `chat_id` and returns the
    /// number of connections it reached. Connections that are closed or whose
    /// queue is full are detached.
    async fn send_to_chat(&self, chat_id: i64, frame: &str) -> usize;
}

/// Connection registry held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryConnectionRegistry {
    // chat_id -> connection_id -> sender
    chats: RwLock<HashMap<i64, HashMap<Uuid, ConnectionSender>>>,
}

impl InMemoryConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live connections following `chat_id`.
    pub async fn connection_count(&self, chat_id: i64) -> usize {
        self.chats.read().await.get(&chat_id).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn join(&self, chat_id: i64, sender: ConnectionSender) -> Uuid {
        let connection_id = Uuid::new_v4();
        self.chats
            .write()
            .await
            .entry(chat_id)
            .or_default()
            .insert(connection_id, sender);
        debug!(chat_id, %connection_id, "connection joined chat");
        connection_id
    }

    async fn leave(&self, chat_id: i64, connection_id: Uuid) {
        let mut chats = self.chats.write().await;
        if let Some(connections) = chats.get_mut(&chat_id) {
            connections.remove(&connection_id);
            if connections.is_empty() {
                chats.remove(&chat_id);
            }
        }
        debug!(chat_id, %connection_id, "connection left chat");
    }

    async fn send_to_chat(&self, chat_id: i64, frame: &str) -> usize {
        let mut closed = Vec::new();
        let mut delivered = 0;
        {
            let chats = self.chats.read().await;
            let Some(connections) = chats.get(&chat_id) else {
                return 0;
            };
            for (connection_id, sender) in connections {
                match sender.try_send(frame.to_owned()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            chat_id,
                            %connection_id,
                            "connection queue full, dropping connection"
                        );
                        closed.push(*connection_id);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*connection_id),
                }
            }
        }

        for connection_id in closed {
            self.leave(chat_id, connection_id).await;
        }
        delivered
    }
}

/// Forwards projected messages to the connections following their chat.
pub struct MessageDispatcher {
    registry: Arc<dyn ConnectionRegistry>,
}

impl MessageDispatcher {
    /// Creates a dispatcher delivering through `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Subscribes the dispatcher to the eager phase of `message-projected`.
    pub fn register(self: Arc<Self>, bus: &EventBus) {
        bus.subscribe(Topic::eager(MESSAGE_PROJECTED), self);
    }
}

#[async_trait]
impl EventHandler for MessageDispatcher {
    async fn handle(&self, event: &DomainEvent, _bus: &EventBus) -> Result<(), DomainError> {
        let message: MessageProjected = from_payload(MESSAGE_PROJECTED, event.payload())?;
        let frame = event.payload().to_string();

        let delivered = self.registry.send_to_chat(message.chat_id, &frame).await;
        info!(
            chat_id = message.chat_id,
            message_id = %message.message_id,
            delivered,
            "projected message dispatched"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MessageDispatcher"
    }
}
