//! Domain types for the messaging context.

pub mod commands;
pub mod events;
