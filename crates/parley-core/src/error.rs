//! Domain error types.

use thiserror::Error;

/// Top-level error type shared by the bus, the stores and the projections.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The durable append of an event failed; the event was not confirmed.
    #[error("store write failed: {0}")]
    StoreWrite(String),

    /// Reading from the event log or the read model failed.
    #[error("store read failed: {0}")]
    StoreRead(String),

    /// A guaranteed notification referenced a log position with no event.
    #[error("projection source missing at log position {0}")]
    ProjectionSourceMissing(i64),

    /// The event found at a log position is not the kind the projection expects.
    #[error("projection source at log position {log_id} has type {actual}, expected {expected}")]
    ProjectionTypeMismatch {
        /// The log position that was fetched.
        log_id: i64,
        /// The type the projection subscribes to.
        expected: String,
        /// The type actually stored.
        actual: String,
    },

    /// Writing the read-model row failed after a successful re-fetch.
    #[error("projection write failed: {0}")]
    ProjectionWrite(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// A requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}
