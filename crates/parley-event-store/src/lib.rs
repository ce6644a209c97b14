//! Parley Event Store — `PostgreSQL` adapters for the event log and the
//! message read model.

pub mod pg_event_store;
pub mod pg_message_repository;
