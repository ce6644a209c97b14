//! Parley API — HTTP and WebSocket surface over the chat event pipeline.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
