//! Model selection: a pass-through to the backend plus the local
//! confirmation line shown in the chat.

use crate::bridge::{BridgeClient, BridgeError};
use serde::{Deserialize, Serialize};

/// Backend model identifier. Wire values are the backend's enum; nothing
/// here validates them beyond that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelId {
    #[default]
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "gpt4o-equivalent")]
    Gpt4o,
}

impl ModelId {
    pub const ALL: [ModelId; 2] = [ModelId::Claude, ModelId::Gpt4o];

    /// Name shown in the selector and the confirmation line.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelId::Claude => "Claude 3.5 Sonnet",
            ModelId::Gpt4o => "GPT-4o",
        }
    }

    /// Identifier sent to the backend.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ModelId::Claude => "claude",
            ModelId::Gpt4o => "gpt4o-equivalent",
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl std::str::FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(ModelId::Claude),
            "gpt4o-equivalent" | "gpt4o" | "gpt-4o" => Ok(ModelId::Gpt4o),
            other => Err(format!("unknown model: {}", other)),
        }
    }
}

/// Forward the selection to the backend. On success returns the
/// confirmation line the caller appends to the surface.
pub async fn select_model(
    bridge: &BridgeClient,
    session_id: &str,
    model: ModelId,
) -> Result<String, BridgeError> {
    bridge.set_model(session_id, model).await?;
    Ok(format!("Now powered by {}.", model.display_name()))
}
