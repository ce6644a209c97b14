//! In-process event bus with a double-emit protocol.
//!
//! Every `publish` notifies subscribers twice. Eager handlers run first, with
//! the event exactly as the producer built it. The event is then appended to
//! the event store, and only when that append commits is it promoted (type
//! suffixed with `-KAFKED`, `log_id` set) and handed to guaranteed handlers.
//! Subscribers choose their point on the latency/durability trade-off by the
//! topic they subscribe to.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DomainError;
use crate::event::{DomainEvent, GUARANTEED_SUFFIX, Phase};
use crate::store::EventStore;

/// A subscription key: an event type at one delivery phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    event_type: String,
    phase: Phase,
}

impl Topic {
    /// Topic notified before the durable append.
    #[must_use]
    pub fn eager(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            phase: Phase::Eager,
        }
    }

    /// Topic notified after the durable append committed.
    #[must_use]
    pub fn guaranteed(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            phase: Phase::Guaranteed,
        }
    }

    /// Base event type, never suffixed.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Delivery phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// Parses a wire-level type string: a `-KAFKED` suffix selects the
/// guaranteed phase.
impl From<&str> for Topic {
    fn from(wire: &str) -> Self {
        match wire.strip_suffix(GUARANTEED_SUFFIX) {
            Some(base) => Self::guaranteed(base),
            None => Self::eager(wire),
        }
    }
}

impl From<String> for Topic {
    fn from(wire: String) -> Self {
        Self::from(wire.as_str())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase {
            Phase::Eager => f.write_str(&self.event_type),
            Phase::Guaranteed => write!(f, "{}{GUARANTEED_SUFFIX}", self.event_type),
        }
    }
}

/// A subscriber to bus topics.
///
/// The bus is passed to every invocation so handlers can publish the events
/// they derive without holding a bus of their own.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Reacts to one published event.
    ///
    /// # Errors
    ///
    /// Returns the `DomainError` that stopped the handler. The bus logs it and
    /// continues with the remaining handlers.
    async fn handle(&self, event: &DomainEvent, bus: &EventBus) -> Result<(), DomainError>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

type HandlerMap = HashMap<Topic, Vec<Arc<dyn EventHandler>>>;

struct BusInner {
    store: Arc<dyn EventStore>,
    handlers: RwLock<HandlerMap>,
}

/// Central publish/subscribe hub. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let topics: Vec<String> = handlers.keys().map(ToString::to_string).collect();
        f.debug_struct("EventBus").field("topics", &topics).finish()
    }
}

impl EventBus {
    /// Creates a bus that persists through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                store,
                handlers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Registers `handler` for `topic`. Handlers of one topic run in
    /// registration order.
    ///
    /// `topic` accepts a wire string (`"incoming-message-KAFKED"`) or a
    /// structured [`Topic`].
    pub fn subscribe(&self, topic: impl Into<Topic>, handler: Arc<dyn EventHandler>) {
        let topic = topic.into();
        info!(topic = %topic, handler = handler.name(), "registering event handler");
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic)
            .or_default()
            .push(handler);
    }

    /// Publishes `event` through the double-emit protocol and returns it in
    /// its confirmed form.
    ///
    /// Guaranteed handlers never run unless the append committed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `event` is already confirmed, and
    /// the store's error if the durable append fails.
    #[instrument(
        skip(self, event),
        fields(
            event_id = %event.event_id(),
            event_type = %event.event_type(),
            correlation_id = %event.metadata().correlation_id,
        )
    )]
    pub async fn publish(&self, mut event: DomainEvent) -> Result<DomainEvent, DomainError> {
        if event.log_id().is_some() || event.has_guaranteed_suffix() {
            warn!("refusing to publish an already confirmed event");
            return Err(DomainError::Validation(format!(
                "event {} is already confirmed",
                event.event_id()
            )));
        }

        let eager = self.handlers_for(&Topic::eager(event.event_type()));
        self.notify(&eager, &event).await;

        let log_id = match self.inner.store.append(&event).await {
            Ok(log_id) => log_id,
            Err(err) => {
                error!(error = %err, "durable append failed, event not confirmed");
                return Err(err);
            }
        };

        event.promote(log_id);
        debug!(log_id, "event confirmed");

        let guaranteed = self.handlers_for(&Topic::guaranteed(event.base_type()));
        self.notify(&guaranteed, &event).await;

        Ok(event)
    }

    /// Snapshot of the handlers for `topic`; the lock is released on return.
    fn handlers_for(&self, topic: &Topic) -> Vec<Arc<dyn EventHandler>> {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    async fn notify(&self, handlers: &[Arc<dyn EventHandler>], event: &DomainEvent) {
        for handler in handlers {
            if let Err(err) = handler.handle(event, self).await {
                warn!(
                    handler = handler.name(),
                    phase = ?event.phase(),
                    error = %err,
                    "event handler failed"
                );
            }
        }
    }
}
