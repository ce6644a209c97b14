//! Integration tests for the chat message pipeline over Postgres.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

#[sqlx::test(migrations = "../../migrations")]
async fn test_send_message_round_trip(pool: PgPool) {
    let state = common::build_test_state(pool);

    // POST /api/v1/chats/1/messages
    let (status, json) = common::post_json(
        common::build_app(state.clone()),
        "/api/v1/chats/1/messages",
        &json!({ "user_id": 7, "message_text": "hello" }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let log_id = json["log_id"].as_i64().unwrap();

    // GET /api/v1/chats/1/messages — the projection ran before the POST returned
    let (status, json) =
        common::get_json(common::build_app(state), "/api/v1/chats/1/messages").await;

    assert_eq!(status, StatusCode::OK);
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "hello");
    assert_eq!(messages[0]["log_id"], log_id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_history_is_scoped_to_chat_and_oldest_first(pool: PgPool) {
    let state = common::build_test_state(pool);
    for (chat_id, text) in [(1, "first"), (2, "elsewhere"), (1, "second")] {
        let (status, _) = common::post_json(
            common::build_app(state.clone()),
            &format!("/api/v1/chats/{chat_id}/messages"),
            &json!({ "user_id": 7, "message_text": text }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) =
        common::get_json(common::build_app(state), "/api/v1/chats/1/messages").await;

    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = json["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_causal_chain_links_projection_to_message(pool: PgPool) {
    let state = common::build_test_state(pool);
    let correlation_id = Uuid::new_v4();

    let (status, sent) = common::post_json(
        common::build_app(state.clone()),
        "/api/v1/chats/1/messages",
        &json!({
            "user_id": 7,
            "message_text": "hello",
            "correlation_id": correlation_id,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["correlation_id"], correlation_id.to_string());

    // GET /api/v1/events/correlation/{correlation_id}
    let (status, json) = common::get_json(
        common::build_app(state.clone()),
        &format!("/api/v1/events/correlation/{correlation_id}"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["eventId"], sent["event_id"]);
    assert_eq!(events[1]["type"], "message-projected");
    assert_eq!(events[1]["causationId"], sent["event_id"]);
    assert!(json["broken_links"].as_array().unwrap().is_empty());

    // GET /api/v1/events/{log_id}
    let log_id = sent["log_id"].as_i64().unwrap();
    let (status, json) =
        common::get_json(common::build_app(state), &format!("/api/v1/events/{log_id}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["type"], "incoming-message");
    assert_eq!(json["payload"]["messageText"], "hello");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_rebuild_is_idempotent_over_existing_rows(pool: PgPool) {
    let state = common::build_test_state(pool);
    common::post_json(
        common::build_app(state.clone()),
        "/api/v1/chats/1/messages",
        &json!({ "user_id": 7, "message_text": "hello" }),
    )
    .await;

    // POST /api/v1/projections/rebuild
    let (status, json) =
        common::post_empty(common::build_app(state.clone()), "/api/v1/projections/rebuild").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["scanned"], 2);
    assert_eq!(json["projected"], 1);

    let (_, json) = common::get_json(common::build_app(state), "/api/v1/chats/1/messages").await;
    assert_eq!(json["messages"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_unknown_event_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);

    let (status, json) = common::get_json(app, "/api/v1/events/999").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}
