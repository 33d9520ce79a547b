//! Bridge wire protocol types (requests, responses, stream events).

use crate::model::ModelId;
use serde::{Deserialize, Serialize};

/// Wire request: `{ "type": "req", "id", "method", "params" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRequest {
    #[serde(rename = "type")]
    pub typ: String,
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl BridgeRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            typ: "req".to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Wire response: `{ "type": "res", "id", "ok", "payload" or "error" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeResponse {
    #[serde(rename = "type")]
    pub typ: String,
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn ok(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            typ: "res".to_string(),
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            typ: "res".to_string(),
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error.into()),
        }
    }
}

/// Wire event frame: `{ "type": "event", "event", "payload" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeEventFrame {
    #[serde(rename = "type")]
    pub typ: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Params for `send_message` and `send_message_stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParams {
    pub session_id: String,
    pub text: String,
}

/// Params for methods that only name a session (`clear_conversation`,
/// `activate_second_assistant`, `deactivate_second_assistant`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    pub session_id: String,
}

/// Params for `set_model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParams {
    pub session_id: String,
    pub model: ModelId,
}

/// Params for `detect_dual_topics`. The check is per message, not per
/// session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectParams {
    pub text: String,
}

/// One push event for a streaming session, parsed from an event frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub session_id: String,
    pub kind: StreamKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    Token(String),
    Complete,
    Error(String),
}

impl StreamEvent {
    /// Parse a wire event frame. None for unrelated event names or frames
    /// missing a session id.
    pub fn from_frame(frame: &BridgeEventFrame) -> Option<StreamEvent> {
        let session_id = frame
            .payload
            .get("sessionId")
            .and_then(|v| v.as_str())?
            .to_string();
        let kind = match frame.event.as_str() {
            "stream.token" => {
                let token = frame.payload.get("token").and_then(|v| v.as_str())?;
                StreamKind::Token(token.to_string())
            }
            "stream.complete" => StreamKind::Complete,
            "stream.error" => {
                let message = frame
                    .payload
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                StreamKind::Error(message.to_string())
            }
            _ => return None,
        };
        Some(StreamEvent { session_id, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_constructors() {
        let ok = BridgeResponse::ok("1", json!({ "started": true }));
        assert!(ok.ok);
        assert_eq!(ok.typ, "res");
        assert!(ok.error.is_none());

        let err = BridgeResponse::err("2", "no such method");
        assert!(!err.ok);
        assert_eq!(err.error.as_deref(), Some("no such method"));
        assert!(err.payload.is_none());
    }

    #[test]
    fn send_params_use_camel_case() {
        let params = SendParams {
            session_id: "sess-1".to_string(),
            text: "hi".to_string(),
        };
        let value = serde_json::to_value(&params).expect("serialize");
        assert_eq!(value.get("sessionId").and_then(|v| v.as_str()), Some("sess-1"));
        assert!(value.get("session_id").is_none());
    }

    #[test]
    fn stream_event_from_token_frame() {
        let frame = BridgeEventFrame {
            typ: "event".to_string(),
            event: "stream.token".to_string(),
            payload: json!({ "sessionId": "sess-1", "token": "Hel" }),
        };
        let event = StreamEvent::from_frame(&frame).expect("parse");
        assert_eq!(event.session_id, "sess-1");
        assert_eq!(event.kind, StreamKind::Token("Hel".to_string()));
    }

    #[test]
    fn stream_event_ignores_unrelated_frames() {
        let frame = BridgeEventFrame {
            typ: "event".to_string(),
            event: "backend.shutdown".to_string(),
            payload: json!({ "sessionId": "sess-1" }),
        };
        assert!(StreamEvent::from_frame(&frame).is_none());

        let missing_session = BridgeEventFrame {
            typ: "event".to_string(),
            event: "stream.complete".to_string(),
            payload: json!({}),
        };
        assert!(StreamEvent::from_frame(&missing_session).is_none());
    }

    #[test]
    fn stream_error_without_message_is_empty() {
        let frame = BridgeEventFrame {
            typ: "event".to_string(),
            event: "stream.error".to_string(),
            payload: json!({ "sessionId": "sess-1" }),
        };
        let event = StreamEvent::from_frame(&frame).expect("parse");
        assert_eq!(event.kind, StreamKind::Error(String::new()));
    }
}
