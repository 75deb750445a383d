//! Voice agent tool manifest and tool-call dispatch.
//!
//! The channel itself lives in `lumiere-runtime`; this module holds the
//! pieces that need no I/O: the configuration sent on connect, the wire
//! messages, and the dispatcher that maps tool calls to local actions.

mod dispatcher;
mod manifest;
mod messages;

pub use dispatcher::{CaptureAction, CaptureError, ToolDispatcher};
pub use manifest::{
    ManifestError, ToolDefinition, VoiceAgentConfig, ADD_TO_CART, AGENT_INSTRUCTIONS,
    DEFAULT_VOICE_MODEL, TRIGGER_CAMERA_SCAN,
};
pub use messages::{FunctionCall, FunctionCallResponse, InboundMessage, OutboundMessage};
