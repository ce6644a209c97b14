//! Parley Core — shared domain abstractions.
//!
//! This crate defines the domain event, the event bus with its double-emit
//! protocol, and the storage contracts the bus and projections depend on.
//! It contains no infrastructure code.

pub mod bus;
pub mod clock;
pub mod error;
pub mod event;
pub mod read_model;
pub mod store;
