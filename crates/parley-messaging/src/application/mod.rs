//! Application services for the messaging context.

pub mod command_handlers;
pub mod dispatcher;
pub mod projector;
pub mod query_handlers;
pub mod replay;
