//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use parley_event_store::pg_event_store::PgEventStore;
use parley_event_store::pg_message_repository::PgMessageRepository;
use parley_messaging::application::dispatcher::InMemoryConnectionRegistry;
use parley_test_support::FixedClock;
use sqlx::PgPool;
use tower::ServiceExt;

use parley_api::routes;
use parley_api::state::AppState;

/// Build application state backed by Postgres, with a fixed clock and an
/// in-memory connection registry.
pub fn build_test_state(pool: PgPool) -> AppState {
    AppState::new(
        Arc::new(FixedClock::default()),
        Arc::new(PgEventStore::new(pool.clone())),
        Arc::new(PgMessageRepository::new(pool)),
        Arc::new(InMemoryConnectionRegistry::new()),
    )
}

/// Build the full app router over `state`. Uses the same route structure as
/// `main.rs`.
pub fn build_app(state: AppState) -> Router {
    routes::router().with_state(state)
}

/// Build the full app router over a fresh Postgres-backed state.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app(build_test_state(pool))
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a POST request with no body and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
