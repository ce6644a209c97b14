//! Event log routes: single events and correlation chains.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::get};
use parley_core::store::StoredEvent;
use parley_messaging::application::query_handlers;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /{log_id}
async fn get_event(
    State(state): State<AppState>,
    Path(log_id): Path<i64>,
) -> Result<Json<StoredEvent>, ApiError> {
    let event = query_handlers::get_event_by_log_id(log_id, state.event_store.as_ref()).await?;
    Ok(Json(event))
}

/// GET /correlation/{correlation_id}
async fn get_causal_chain(
    State(state): State<AppState>,
    Path(correlation_id): Path<Uuid>,
) -> Result<Json<query_handlers::CausalChainView>, ApiError> {
    let chain =
        query_handlers::get_causal_chain(correlation_id, state.event_store.as_ref()).await?;
    Ok(Json(chain))
}

/// Returns the router for event log routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{log_id}", get(get_event))
        .route("/correlation/{correlation_id}", get(get_causal_chain))
}
