//! Parley — chat messaging bounded context.
//!
//! Produces `incoming-message` events, projects confirmed messages into the
//! `messages` read model, and fans projected messages out to connected
//! participants.

pub mod application;
pub mod domain;
