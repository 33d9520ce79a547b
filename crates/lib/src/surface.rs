//! Chat surface: the transcript plus the streaming controller for one
//! assistant reply at a time.
//!
//! A surface owns the message list, the in-flight streaming slot, and the
//! input gate. At most one streaming session is active per surface; input
//! stays disabled from begin_stream until completion or error, so sends
//! can never overlap.

/// Glyph drawn after an in-progress assistant message while tokens stream.
pub const CURSOR_GLYPH: char = '▋';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Transcript label for this role.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}

/// One rendered message. `pending` is true only for the assistant message
/// currently receiving tokens; completed messages never change again.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub pending: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            pending: false,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            pending: false,
        }
    }

    fn streaming_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            text: String::new(),
            pending: true,
        }
    }

    /// Text to draw: a pending message carries exactly one trailing cursor
    /// glyph; the stored text never contains it.
    pub fn display_text(&self) -> String {
        if self.pending {
            format!("{}{}", self.text, CURSOR_GLYPH)
        } else {
            self.text.clone()
        }
    }
}

/// The one in-flight assistant reply on a surface.
#[derive(Debug)]
struct StreamingSession {
    /// Transcript index of the pending assistant message.
    index: usize,
    accumulated: String,
}

/// Per-surface chat state: transcript, input gate, streaming slot.
#[derive(Debug)]
pub struct ChatSurface {
    messages: Vec<Message>,
    streaming: Option<StreamingSession>,
    input_enabled: bool,
    focus_input: bool,
}

impl Default for ChatSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSurface {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            streaming: None,
            input_enabled: true,
            focus_input: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// One-shot focus request, set whenever input is re-enabled.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_input)
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Start a streaming assistant reply: append an empty pending message
    /// and disable input. Returns false (and changes nothing) when a
    /// session is already active — callers are expected to pre-check.
    pub fn begin_stream(&mut self) -> bool {
        if self.streaming.is_some() {
            return false;
        }
        let index = self.messages.len();
        self.messages.push(Message::streaming_placeholder());
        self.streaming = Some(StreamingSession {
            index,
            accumulated: String::new(),
        });
        self.input_enabled = false;
        true
    }

    /// Append one token to the active reply. No-op without a session.
    pub fn on_token(&mut self, token: &str) {
        let Some(session) = self.streaming.as_mut() else {
            return;
        };
        session.accumulated.push_str(token);
        if let Some(message) = self.messages.get_mut(session.index) {
            message.text.push_str(token);
        }
    }

    /// Finish the active reply: clear the pending marker, discard the
    /// session, re-enable input, request focus. No-op without a session.
    pub fn on_complete(&mut self) {
        let Some(session) = self.streaming.take() else {
            return;
        };
        if let Some(message) = self.messages.get_mut(session.index) {
            message.pending = false;
        }
        self.input_enabled = true;
        self.focus_input = true;
    }

    /// Replace the active reply with the literal error text and tear the
    /// session down. No-op without a session.
    pub fn on_error(&mut self, error: impl Into<String>) {
        let Some(session) = self.streaming.take() else {
            return;
        };
        if let Some(message) = self.messages.get_mut(session.index) {
            message.text = error.into();
            message.pending = false;
        }
        self.input_enabled = true;
        self.focus_input = true;
    }

    /// Disable input while a send is still waiting on the topic check,
    /// before any stream has begun.
    pub fn hold_input(&mut self) {
        self.input_enabled = false;
    }

    /// Re-enable input without touching the transcript (a held send that
    /// ended up dispatched elsewhere or not at all).
    pub fn release_input(&mut self) {
        if self.streaming.is_none() {
            self.input_enabled = true;
            self.focus_input = true;
        }
    }

    /// Empty the transcript. The caller issues the matching
    /// clear_conversation call.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.streaming = None;
        self.input_enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_concatenate_with_one_trailing_glyph() {
        let mut surface = ChatSurface::new();
        assert!(surface.begin_stream());
        surface.on_token("Hel");
        surface.on_token("lo ");
        surface.on_token("there");

        let message = surface.messages().last().expect("pending message");
        assert!(message.pending);
        assert_eq!(message.text, "Hello there");
        assert_eq!(message.display_text(), format!("Hello there{}", CURSOR_GLYPH));
        assert_eq!(
            message.display_text().matches(CURSOR_GLYPH).count(),
            1,
            "exactly one glyph while streaming"
        );

        surface.on_complete();
        let message = surface.messages().last().expect("completed message");
        assert!(!message.pending);
        assert_eq!(message.display_text(), "Hello there");
        assert!(!message.display_text().contains(CURSOR_GLYPH));
    }

    #[test]
    fn callbacks_without_session_are_no_ops() {
        let mut surface = ChatSurface::new();
        surface.on_token("stray");
        surface.on_complete();
        surface.on_error("stray error");
        assert!(surface.messages().is_empty());
        assert!(surface.input_enabled());
    }

    #[test]
    fn begin_stream_refused_while_active() {
        let mut surface = ChatSurface::new();
        assert!(surface.begin_stream());
        assert!(!surface.begin_stream());
        assert_eq!(surface.messages().len(), 1, "no second placeholder");
        surface.on_token("a");
        assert_eq!(surface.messages()[0].text, "a");
    }

    #[test]
    fn input_gated_between_begin_and_complete() {
        let mut surface = ChatSurface::new();
        assert!(surface.input_enabled());
        surface.begin_stream();
        assert!(!surface.input_enabled());
        surface.on_token("x");
        assert!(!surface.input_enabled());
        surface.on_complete();
        assert!(surface.input_enabled());
        assert!(surface.take_focus_request());
        assert!(!surface.take_focus_request(), "focus request is one-shot");
    }

    #[test]
    fn error_replaces_text_and_reenables_input() {
        let mut surface = ChatSurface::new();
        surface.begin_stream();
        surface.on_token("partial rep");
        surface.on_error("Error: backend went away");

        let message = surface.messages().last().expect("error message");
        assert_eq!(message.text, "Error: backend went away");
        assert!(!message.pending);
        assert!(surface.input_enabled());
        assert!(!surface.is_streaming());
    }

    #[test]
    fn hold_and_release_input_around_topic_check() {
        let mut surface = ChatSurface::new();
        surface.hold_input();
        assert!(!surface.input_enabled());
        surface.release_input();
        assert!(surface.input_enabled());

        // Release never re-enables input under an active stream.
        surface.begin_stream();
        surface.release_input();
        assert!(!surface.input_enabled());
    }

    #[test]
    fn clear_empties_transcript() {
        let mut surface = ChatSurface::new();
        surface.push_user("question");
        surface.push_assistant("answer");
        surface.begin_stream();
        surface.clear();
        assert!(surface.messages().is_empty());
        assert!(!surface.is_streaming());
        assert!(surface.input_enabled());
    }

    #[test]
    fn messages_keep_arrival_order() {
        let mut surface = ChatSurface::new();
        surface.push_user("first");
        surface.push_assistant("second");
        surface.push_user("third");
        let roles: Vec<Role> = surface.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }
}
