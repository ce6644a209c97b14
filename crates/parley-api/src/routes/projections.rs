//! Projection maintenance routes.

use axum::extract::{Query, State};
use axum::{Json, Router, routing::post};
use parley_messaging::application::replay::{self, ReplaySummary};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_BATCH_SIZE: i64 = 500;

/// Query string for POST /rebuild.
#[derive(Debug, Deserialize)]
pub struct RebuildParams {
    /// Log rows read per batch.
    pub batch_size: Option<i64>,
}

/// POST /rebuild
#[instrument(skip(state))]
async fn rebuild(
    State(state): State<AppState>,
    Query(params): Query<RebuildParams>,
) -> Result<Json<ReplaySummary>, ApiError> {
    let batch_size = params.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
    info!(batch_size, "rebuilding message projection");

    let summary = replay::rebuild_projection(
        state.event_store.as_ref(),
        state.messages.as_ref(),
        batch_size,
    )
    .await?;
    Ok(Json(summary))
}

/// Returns the router for projection routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/rebuild", post(rebuild))
}
