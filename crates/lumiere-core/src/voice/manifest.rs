//! Voice agent configuration and tool manifest.
//!
//! Tool parameter objects are JSON Schemas; the dispatcher compiles them
//! once and validates every inbound call against them.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub const DEFAULT_VOICE_MODEL: &str = "aura-asteria-en";
pub const TRIGGER_CAMERA_SCAN: &str = "trigger_camera_scan";
pub const ADD_TO_CART: &str = "add_to_cart";

/// System instructions for the speech agent.
pub const AGENT_INSTRUCTIONS: &str = "You are Lumiere, an AI Dermatologist. \
When a user asks for a skin analysis, you must verbally reply: \
'Of course, let me run a dermal diagnostic now.' and then immediately trigger the \
`trigger_camera_scan` tool. After the scan, you recommend products. You must ask if \
they want the products added to their cart, and trigger the `add_to_cart` function if \
they say yes. Be professional, clinical, and helpful.";

/// Errors from building a tool manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("invalid parameter schema for tool `{tool}`: {message}")]
    InvalidSchema { tool: String, message: String },

    #[error("duplicate tool name `{0}`")]
    DuplicateTool(String),
}

/// A tool the speech agent may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the call parameters
    pub parameters: JsonValue,
}

impl ToolDefinition {
    pub fn trigger_camera_scan() -> Self {
        Self {
            name: TRIGGER_CAMERA_SCAN.to_string(),
            description: "Instructs the frontend to snap a photo and run skin analysis.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    pub fn add_to_cart() -> Self {
        Self {
            name: ADD_TO_CART.to_string(),
            description: "Accepts a productId and adds the matching recommended product to the user's cart."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "productId": {
                        "type": "string",
                        "description": "The ID of the product to add to cart"
                    }
                },
                "required": ["productId"]
            }),
        }
    }
}

/// Configuration sent to the speech agent once the channel opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceAgentConfig {
    pub model: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
}

impl Default for VoiceAgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_VOICE_MODEL.to_string(),
            instructions: AGENT_INSTRUCTIONS.to_string(),
            tools: vec![ToolDefinition::trigger_camera_scan(), ToolDefinition::add_to_cart()],
        }
    }
}

impl VoiceAgentConfig {
    /// Default manifest with a different voice model.
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }
}
