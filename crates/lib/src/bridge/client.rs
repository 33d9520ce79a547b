//! Bridge client: request/response with id correlation plus per-session
//! stream event subscriptions, all over one WebSocket connection.

use crate::bridge::protocol::{
    BridgeEventFrame, BridgeRequest, BridgeResponse, DetectParams, ModelParams, SendParams,
    SessionParams, StreamEvent,
};
use crate::model::ModelId;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Result<serde_json::Value, BridgeError>>>>>;
type SubscriberMap = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<StreamEvent>>>>;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge transport failed: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("bridge connection closed")]
    Closed,
    #[error("unexpected bridge payload: {0}")]
    Protocol(String),
}

/// Client side of the backend bridge. Cheap to clone; clones share the
/// socket, the pending-request map, and the subscriber table.
#[derive(Clone)]
pub struct BridgeClient {
    sink: Arc<Mutex<WsSink>>,
    pending: PendingMap,
    subscribers: SubscriberMap,
}

impl BridgeClient {
    /// Connect to the backend bridge and spawn the reader task.
    pub async fn connect(url: &str) -> Result<Self, BridgeError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let (sink, source) = ws.split();
        let client = Self {
            sink: Arc::new(Mutex::new(sink)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        };
        tokio::spawn(read_loop(
            source,
            client.pending.clone(),
            client.subscribers.clone(),
        ));
        Ok(client)
    }

    /// Send one request and await its response payload.
    pub async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, BridgeError> {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let req = BridgeRequest::new(&id, method, params);
        let text = serde_json::to_string(&req).map_err(|e| BridgeError::Protocol(e.to_string()))?;
        if let Err(e) = self.sink.lock().await.send(Message::Text(text)).await {
            self.pending.lock().await.remove(&id);
            return Err(BridgeError::Transport(e));
        }

        rx.await.map_err(|_| BridgeError::Closed)?
    }

    /// Subscribe to stream events for a session. Events for sessions with
    /// no subscriber are dropped by the reader; dropping the receiver
    /// unsubscribes on the next event.
    pub async fn subscribe(&self, session_id: &str) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .await
            .insert(session_id.to_string(), tx);
        rx
    }

    /// Stop routing events for a session (surface teardown).
    pub async fn unsubscribe(&self, session_id: &str) {
        self.subscribers.lock().await.remove(session_id);
    }

    /// `send_message`: one full (non-streaming) reply.
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<String, BridgeError> {
        let params = to_params(SendParams {
            session_id: session_id.to_string(),
            text: text.to_string(),
        })?;
        let payload = self.request("send_message", params).await?;
        payload
            .get("reply")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| BridgeError::Protocol("missing reply".to_string()))
    }

    /// `send_message_stream`: acknowledged start; tokens, completion, and
    /// errors arrive on the session's subscription.
    pub async fn send_message_stream(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<(), BridgeError> {
        let params = to_params(SendParams {
            session_id: session_id.to_string(),
            text: text.to_string(),
        })?;
        self.request("send_message_stream", params).await?;
        Ok(())
    }

    /// `clear_conversation`: drop the backend-side history for a session.
    pub async fn clear_conversation(&self, session_id: &str) -> Result<(), BridgeError> {
        let params = to_params(SessionParams {
            session_id: session_id.to_string(),
        })?;
        self.request("clear_conversation", params).await?;
        Ok(())
    }

    /// `set_model`: pass the selection through; the backend validates.
    pub async fn set_model(&self, session_id: &str, model: ModelId) -> Result<(), BridgeError> {
        let params = to_params(ModelParams {
            session_id: session_id.to_string(),
            model,
        })?;
        self.request("set_model", params).await?;
        Ok(())
    }

    /// `detect_dual_topics`: single request/response classification.
    pub async fn detect_dual_topics(&self, text: &str) -> Result<bool, BridgeError> {
        let params = to_params(DetectParams {
            text: text.to_string(),
        })?;
        let payload = self.request("detect_dual_topics", params).await?;
        payload
            .get("dual")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| BridgeError::Protocol("missing dual verdict".to_string()))
    }

    pub async fn activate_second_assistant(&self, session_id: &str) -> Result<(), BridgeError> {
        let params = to_params(SessionParams {
            session_id: session_id.to_string(),
        })?;
        self.request("activate_second_assistant", params).await?;
        Ok(())
    }

    pub async fn deactivate_second_assistant(&self, session_id: &str) -> Result<(), BridgeError> {
        let params = to_params(SessionParams {
            session_id: session_id.to_string(),
        })?;
        self.request("deactivate_second_assistant", params).await?;
        Ok(())
    }
}

fn to_params<T: serde::Serialize>(params: T) -> Result<serde_json::Value, BridgeError> {
    serde_json::to_value(params).map_err(|e| BridgeError::Protocol(e.to_string()))
}

/// Reader task: routes responses to pending requests and stream events to
/// session subscribers. When the socket closes, every pending request
/// fails with Closed and all subscriptions end.
async fn read_loop(mut source: WsSource, pending: PendingMap, subscribers: SubscriberMap) {
    while let Some(msg) = source.next().await {
        let Ok(msg) = msg else { break };
        let Message::Text(text) = msg else { continue };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
            continue;
        };
        match value.get("type").and_then(|v| v.as_str()) {
            Some("res") => {
                let Ok(res) = serde_json::from_value::<BridgeResponse>(value) else {
                    continue;
                };
                let sender = pending.lock().await.remove(&res.id);
                if let Some(tx) = sender {
                    let result = if res.ok {
                        Ok(res.payload.unwrap_or(serde_json::Value::Null))
                    } else {
                        Err(BridgeError::Backend(
                            res.error.unwrap_or_else(|| "backend error".to_string()),
                        ))
                    };
                    let _ = tx.send(result);
                }
            }
            Some("event") => {
                let Ok(frame) = serde_json::from_value::<BridgeEventFrame>(value) else {
                    continue;
                };
                let Some(event) = StreamEvent::from_frame(&frame) else {
                    continue;
                };
                let session_id = event.session_id.clone();
                let mut subs = subscribers.lock().await;
                match subs.get(&session_id) {
                    Some(tx) => {
                        if tx.send(event).is_err() {
                            subs.remove(&session_id);
                        }
                    }
                    None => {
                        log::debug!("dropping stream event for session {} (no surface)", session_id);
                    }
                }
            }
            _ => {}
        }
    }

    let mut pending = pending.lock().await;
    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(BridgeError::Closed));
    }
    subscribers.lock().await.clear();
}
