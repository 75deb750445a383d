//! # lumiere-core
//!
//! Deterministic domain model for the Lumiere clinic demo.
//!
//! Everything in this crate is free of I/O:
//! - the records passed between endpoints ([`types`])
//! - score-to-category mapping ([`recommendation`])
//! - provider payload adapters and their validity checks ([`adapters`])
//! - static fallback catalogs ([`fallbacks`])
//! - report rendering, including an in-memory PDF ([`report`])
//! - the voice agent manifest and tool-call dispatcher ([`voice`])
//!
//! The network side (remote calls, fallback chains, the voice channel)
//! lives in `lumiere-runtime`.
//!
//! ## Example
//!
//! ```rust
//! use lumiere_core::{fallbacks, recommendation};
//!
//! let scores = fallbacks::FALLBACK_SCORES;
//! assert_eq!(recommendation::target_issue_for(&scores), "hydration");
//! ```

pub mod adapters;
pub mod fallbacks;
pub mod patterns;
pub mod recommendation;
pub mod report;
pub mod types;
pub mod voice;

pub use adapters::ShapeError;
pub use types::{
    AnalysisScores, Biomarker, CartState, Product, ProductRef, ResearchInsight, ScanRecord,
};
pub use voice::{
    CaptureAction, CaptureError, FunctionCall, FunctionCallResponse, ToolDefinition,
    ToolDispatcher, VoiceAgentConfig,
};
