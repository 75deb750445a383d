//! Control messages exchanged with the speech agent.
//!
//! Audio travels as binary frames; everything here is a JSON text frame
//! tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::manifest::ToolDefinition;

/// A tool call requested by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub parameters: JsonValue,
}

/// Acknowledgment for a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    pub call_id: String,
    pub name: String,
    pub output: String,
}

/// Messages received from the agent. Unknown types are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    FunctionCallRequest(FunctionCall),
    #[serde(other)]
    Other,
}

/// Messages sent to the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    SettingsConfiguration {
        model: String,
        instructions: String,
        tools: Vec<ToolDefinition>,
    },
    FunctionCallResponse(FunctionCallResponse),
}

impl InboundMessage {
    /// Parse a text frame. Malformed frames are treated as unknown.
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or(InboundMessage::Other)
    }
}

impl OutboundMessage {
    pub fn to_json(&self) -> String {
        // Serializing these plain structs cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
