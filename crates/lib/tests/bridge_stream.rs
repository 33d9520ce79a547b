//! Integration tests: drive the real bridge client against an in-process
//! fake backend that speaks the req/res/event protocol over WebSocket.
//! The fake stands in for the external backend process; tests cover the
//! request round trip, token streaming order, error surfacing, and the
//! dual-topic verdicts.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use lib::bridge::{BridgeClient, BridgeError, StreamKind};
use lib::handshake::{self, TopicCheck};
use lib::surface::{ChatSurface, CURSOR_GLYPH};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const EVENT_WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct FakeBackend {
    detect_calls: Arc<AtomicUsize>,
    clear_calls: Arc<AtomicUsize>,
}

async fn start_fake_backend() -> (String, FakeBackend) {
    let state = FakeBackend::default();
    let app = Router::new()
        .route("/", get(health))
        .route("/ws", get(ws_handler))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake backend");
    let port = listener.local_addr().expect("local_addr").port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("ws://127.0.0.1:{}/ws", port), state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "runtime": "running", "protocol": 1 }))
}

async fn ws_handler(State(state): State<FakeBackend>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(socket: &mut WebSocket, value: serde_json::Value) {
    let _ = socket.send(Message::Text(value.to_string())).await;
}

async fn handle_socket(mut socket: WebSocket, state: FakeBackend) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(req) = serde_json::from_str::<serde_json::Value>(&text) else {
            continue;
        };
        if req.get("type").and_then(|v| v.as_str()) != Some("req") {
            continue;
        }
        let id = req.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let params = req.get("params").cloned().unwrap_or(json!({}));
        let session_id = params
            .get("sessionId")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let message_text = params.get("text").and_then(|v| v.as_str()).unwrap_or("");

        match req.get("method").and_then(|v| v.as_str()).unwrap_or("") {
            "send_message" => {
                if message_text == "fail" {
                    send_json(
                        &mut socket,
                        json!({ "type": "res", "id": id, "ok": false, "error": "backend exploded" }),
                    )
                    .await;
                } else {
                    send_json(
                        &mut socket,
                        json!({
                            "type": "res", "id": id, "ok": true,
                            "payload": { "reply": format!("echo: {}", message_text) }
                        }),
                    )
                    .await;
                }
            }
            "send_message_stream" => {
                send_json(
                    &mut socket,
                    json!({ "type": "res", "id": id, "ok": true, "payload": { "started": true } }),
                )
                .await;
                if message_text == "explode" {
                    send_json(
                        &mut socket,
                        json!({
                            "type": "event", "event": "stream.error",
                            "payload": { "sessionId": session_id, "message": "model unavailable" }
                        }),
                    )
                    .await;
                } else {
                    for token in message_text.split_inclusive(' ') {
                        send_json(
                            &mut socket,
                            json!({
                                "type": "event", "event": "stream.token",
                                "payload": { "sessionId": session_id, "token": token }
                            }),
                        )
                        .await;
                    }
                    send_json(
                        &mut socket,
                        json!({
                            "type": "event", "event": "stream.complete",
                            "payload": { "sessionId": session_id }
                        }),
                    )
                    .await;
                }
            }
            "detect_dual_topics" => {
                state.detect_calls.fetch_add(1, Ordering::SeqCst);
                if message_text == "unclassifiable" {
                    send_json(
                        &mut socket,
                        json!({ "type": "res", "id": id, "ok": false, "error": "classifier offline" }),
                    )
                    .await;
                } else {
                    let dual = message_text.contains(" and also ");
                    send_json(
                        &mut socket,
                        json!({ "type": "res", "id": id, "ok": true, "payload": { "dual": dual } }),
                    )
                    .await;
                }
            }
            "clear_conversation" => {
                state.clear_calls.fetch_add(1, Ordering::SeqCst);
                send_json(
                    &mut socket,
                    json!({ "type": "res", "id": id, "ok": true, "payload": { "cleared": true } }),
                )
                .await;
            }
            "set_model" => {
                let model = params.get("model").cloned().unwrap_or(json!(null));
                send_json(
                    &mut socket,
                    json!({ "type": "res", "id": id, "ok": true, "payload": { "model": model } }),
                )
                .await;
            }
            "activate_second_assistant" => {
                send_json(
                    &mut socket,
                    json!({ "type": "res", "id": id, "ok": true, "payload": { "active": true } }),
                )
                .await;
            }
            "deactivate_second_assistant" => {
                send_json(
                    &mut socket,
                    json!({ "type": "res", "id": id, "ok": true, "payload": { "active": false } }),
                )
                .await;
            }
            other => {
                send_json(
                    &mut socket,
                    json!({ "type": "res", "id": id, "ok": false, "error": format!("unknown method: {}", other) }),
                )
                .await;
            }
        }
    }
}

#[tokio::test]
async fn send_message_round_trip() {
    let (url, _state) = start_fake_backend().await;
    let bridge = BridgeClient::connect(&url).await.expect("connect");

    let reply = bridge
        .send_message("sess-1", "hello backend")
        .await
        .expect("reply");
    assert_eq!(reply, "echo: hello backend");
}

#[tokio::test]
async fn backend_errors_map_to_bridge_error() {
    let (url, _state) = start_fake_backend().await;
    let bridge = BridgeClient::connect(&url).await.expect("connect");

    let err = bridge
        .send_message("sess-1", "fail")
        .await
        .expect_err("backend reports an error");
    match err {
        BridgeError::Backend(message) => assert_eq!(message, "backend exploded"),
        other => panic!("expected Backend error, got {:?}", other),
    }
}

#[tokio::test]
async fn streamed_tokens_arrive_in_order_and_complete() {
    let (url, _state) = start_fake_backend().await;
    let bridge = BridgeClient::connect(&url).await.expect("connect");

    let mut events = bridge.subscribe("sess-a").await;
    let mut surface = ChatSurface::new();
    assert!(surface.begin_stream());

    bridge
        .send_message_stream("sess-a", "alpha beta gamma")
        .await
        .expect("stream started");

    let mut saw_token = false;
    loop {
        let event = timeout(EVENT_WAIT, events.recv())
            .await
            .expect("event before timeout")
            .expect("stream open");
        assert_eq!(event.session_id, "sess-a");
        match event.kind {
            StreamKind::Token(token) => {
                surface.on_token(&token);
                saw_token = true;
                let pending = surface.messages().last().expect("pending message");
                assert!(pending.display_text().ends_with(CURSOR_GLYPH));
            }
            StreamKind::Complete => {
                surface.on_complete();
                break;
            }
            StreamKind::Error(message) => panic!("unexpected stream error: {}", message),
        }
    }

    assert!(saw_token);
    let message = surface.messages().last().expect("final message");
    assert_eq!(message.text, "alpha beta gamma");
    assert!(!message.display_text().contains(CURSOR_GLYPH));
    assert!(surface.input_enabled());
}

#[tokio::test]
async fn stream_error_replaces_the_reply() {
    let (url, _state) = start_fake_backend().await;
    let bridge = BridgeClient::connect(&url).await.expect("connect");

    let mut events = bridge.subscribe("sess-a").await;
    let mut surface = ChatSurface::new();
    surface.begin_stream();

    bridge
        .send_message_stream("sess-a", "explode")
        .await
        .expect("stream started");

    let event = timeout(EVENT_WAIT, events.recv())
        .await
        .expect("event before timeout")
        .expect("stream open");
    match event.kind {
        StreamKind::Error(message) => surface.on_error(message),
        other => panic!("expected stream error, got {:?}", other),
    }

    let message = surface.messages().last().expect("error message");
    assert_eq!(message.text, "model unavailable");
    assert!(!message.pending);
    assert!(surface.input_enabled());
}

#[tokio::test]
async fn dual_topic_check_verdicts() {
    let (url, state) = start_fake_backend().await;
    let bridge = BridgeClient::connect(&url).await.expect("connect");

    let text = "fix my printer and also explain quantum entanglement";
    match handshake::check_dual_topics(&bridge, text, false).await {
        TopicCheck::Dual(prompt) => assert_eq!(prompt.pending_message(), text),
        TopicCheck::NotDual => panic!("expected a dual verdict"),
    }
    assert!(matches!(
        handshake::check_dual_topics(&bridge, "just one topic", false).await,
        TopicCheck::NotDual
    ));
    assert_eq!(state.detect_calls.load(Ordering::SeqCst), 2);

    // With a second assistant active the check is skipped entirely.
    assert!(matches!(
        handshake::check_dual_topics(&bridge, text, true).await,
        TopicCheck::NotDual
    ));
    assert_eq!(state.detect_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_topic_check_falls_back_to_not_dual() {
    let (url, state) = start_fake_backend().await;
    let bridge = BridgeClient::connect(&url).await.expect("connect");

    assert!(matches!(
        handshake::check_dual_topics(&bridge, "unclassifiable", false).await,
        TopicCheck::NotDual
    ));
    assert_eq!(state.detect_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn clear_conversation_acks_one_call() {
    let (url, state) = start_fake_backend().await;
    let bridge = BridgeClient::connect(&url).await.expect("connect");

    bridge.clear_conversation("sess-a").await.expect("cleared");
    assert_eq!(state.clear_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn events_for_unsubscribed_sessions_are_dropped() {
    let (url, _state) = start_fake_backend().await;
    let bridge = BridgeClient::connect(&url).await.expect("connect");

    let mut events = bridge.subscribe("sess-a").await;

    // A stream for a session nobody watches; its events must vanish.
    bridge
        .send_message_stream("sess-ghost", "lost words")
        .await
        .expect("stream started");
    bridge
        .send_message_stream("sess-a", "kept")
        .await
        .expect("stream started");

    let event = timeout(EVENT_WAIT, events.recv())
        .await
        .expect("event before timeout")
        .expect("stream open");
    assert_eq!(event.session_id, "sess-a", "ghost session events were dropped");
    assert_eq!(event.kind, StreamKind::Token("kept".to_string()));
}

#[tokio::test]
async fn select_model_confirms_locally() {
    let (url, _state) = start_fake_backend().await;
    let bridge = BridgeClient::connect(&url).await.expect("connect");

    let line = lib::model::select_model(&bridge, "sess-a", lib::model::ModelId::Gpt4o)
        .await
        .expect("model set");
    assert_eq!(line, "Now powered by GPT-4o.");
}
