//! Shared application state.

use std::sync::Arc;

use parley_core::bus::EventBus;
use parley_core::clock::Clock;
use parley_core::read_model::MessageRepository;
use parley_core::store::EventStore;
use parley_messaging::application::dispatcher::{ConnectionRegistry, MessageDispatcher};
use parley_messaging::application::projector::MessageProjector;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock stamping events created by request handlers.
    pub clock: Arc<dyn Clock>,
    /// The event log.
    pub event_store: Arc<dyn EventStore>,
    /// The `messages` read model.
    pub messages: Arc<dyn MessageRepository>,
    /// Live WebSocket connections by chat.
    pub connections: Arc<dyn ConnectionRegistry>,
    /// Bus with the projector and dispatcher subscribed.
    pub bus: EventBus,
}

impl AppState {
    /// Builds the bus over `event_store` and wires the projection pipeline
    /// onto it.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_store: Arc<dyn EventStore>,
        messages: Arc<dyn MessageRepository>,
        connections: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        let bus = EventBus::new(event_store.clone());

        Arc::new(MessageProjector::new(
            event_store.clone(),
            messages.clone(),
            clock.clone(),
        ))
        .register(&bus);
        Arc::new(MessageDispatcher::new(connections.clone())).register(&bus);

        Self {
            clock,
            event_store,
            messages,
            connections,
            bus,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
