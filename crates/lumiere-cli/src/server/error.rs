use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use lumiere_runtime::StrictModeError;

/// Errors surfaced to HTTP clients.
///
/// Remote failures never show up here: the resolver absorbs them. Only
/// missing required input, and fallbacks refused in strict mode, do.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Image is required")]
    ImageRequired,

    #[error("Concern is required")]
    ConcernRequired,

    #[error("Scores are required")]
    ScoresRequired,

    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Clinical Service Interrupted")]
    ReportInterrupted,

    #[error("Upstream unavailable: {0}")]
    Unavailable(#[from] StrictModeError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::ImageRequired
            | AppError::ConcernRequired
            | AppError::ScoresRequired
            | AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::ReportInterrupted => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = match &self {
            AppError::Unavailable(e) => json!({
                "error": self.to_string(),
                "fallback": e.source_tag,
                "rejections": e.rejections,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
