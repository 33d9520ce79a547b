//! Dual-topic handshake: decide whether an outgoing message should open a
//! second assistant before it is dispatched.

use crate::bridge::BridgeClient;

/// Outcome of the pre-dispatch topic check.
#[derive(Debug)]
pub enum TopicCheck {
    /// Dispatch into the primary session as usual.
    NotDual,
    /// The message spans two topics; ask the user before dispatching.
    Dual(DualTopicPrompt),
}

/// A pending dual-topic question. Resolving consumes the prompt, so each
/// prompt is answered exactly once and never replayed.
#[derive(Debug)]
pub struct DualTopicPrompt {
    pending_message: String,
}

impl DualTopicPrompt {
    pub fn new(pending_message: impl Into<String>) -> Self {
        Self {
            pending_message: pending_message.into(),
        }
    }

    pub fn pending_message(&self) -> &str {
        &self.pending_message
    }

    /// Open a second assistant; the returned message is dispatched there.
    pub fn accept(self) -> String {
        self.pending_message
    }

    /// Stay with one assistant; the returned message is dispatched into
    /// the primary session.
    pub fn decline(self) -> String {
        self.pending_message
    }
}

/// Run the topic check for one outgoing message. Skipped entirely once a
/// second assistant is active; a failed check falls back to NotDual so
/// the user is never blocked from sending.
pub async fn check_dual_topics(
    bridge: &BridgeClient,
    text: &str,
    second_active: bool,
) -> TopicCheck {
    if second_active {
        return TopicCheck::NotDual;
    }
    match bridge.detect_dual_topics(text).await {
        Ok(true) => TopicCheck::Dual(DualTopicPrompt::new(text)),
        Ok(false) => TopicCheck::NotDual,
        Err(e) => {
            log::debug!("dual-topic check failed, dispatching normally: {}", e);
            TopicCheck::NotDual
        }
    }
}

/// Tell the backend the second assistant is live. Best-effort: a failure
/// is logged and the pending message is still dispatched.
pub async fn activate_second(bridge: &BridgeClient, session_id: &str) {
    if let Err(e) = bridge.activate_second_assistant(session_id).await {
        log::warn!("activate_second_assistant failed: {}", e);
    }
}

/// Tell the backend the second assistant is gone. Logged only; never
/// blocks closing the surface.
pub async fn deactivate_second(bridge: &BridgeClient, session_id: &str) {
    if let Err(e) = bridge.deactivate_second_assistant(session_id).await {
        log::warn!("deactivate_second_assistant failed: {}", e);
    }
}
