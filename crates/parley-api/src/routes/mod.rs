//! Route modules.

use axum::Router;

use crate::state::AppState;

pub mod events;
pub mod health;
pub mod messages;
pub mod projections;

/// Returns every route of the API, without middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/chats", messages::router())
        .nest("/api/v1/events", events::router())
        .nest("/api/v1/projections", projections::router())
}
