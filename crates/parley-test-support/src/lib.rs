//! Shared test mocks and utilities for the Parley chat backbone.

mod clock;
mod handler;
mod read_model;
mod store;

pub use clock::{FixedClock, fixed_now};
pub use handler::{FailingHandler, RecordingHandler};
pub use read_model::{FailingMessageRepository, InMemoryMessageRepository};
pub use store::{FailingEventStore, InMemoryEventStore};
