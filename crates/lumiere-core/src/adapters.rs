//! Provider response adapters.
//!
//! One adapter per external shape. Each maps a documented provider payload
//! into the internal normalized type, with defaulting rules stated once here
//! instead of inline at each call site.

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::fallbacks::FALLBACK_SCORES;
use crate::types::{clamp_score, AnalysisScores, Product, ResearchInsight, ScanRecord};

/// Maximum number of products returned per category.
pub const MAX_PRODUCTS: usize = 5;

/// A provider responded, but its payload failed the validity check.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("`{0}` contained no usable entries")]
    Empty(&'static str),
}

fn kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn require_object(payload: &JsonValue) -> Result<&serde_json::Map<String, JsonValue>, ShapeError> {
    payload
        .as_object()
        .ok_or_else(|| ShapeError::NotAnObject(kind(payload)))
}

/// First numeric value among `keys`, or `default`.
fn score_field(
    object: &serde_json::Map<String, JsonValue>,
    keys: &[&str],
    default: u8,
) -> u8 {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(JsonValue::as_f64))
        .map(clamp_score)
        .unwrap_or(default)
}

fn non_empty_str<'a>(value: &'a JsonValue, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Skin analysis response.
///
/// Reads `spots_score|spots`, `moisture_score|moisture`,
/// `texture_score|texture` and `dark_circle_score|dark_circles`.
/// Missing or non-numeric fields take the fallback score for that field.
pub fn adapt_vision(payload: &JsonValue) -> Result<AnalysisScores, ShapeError> {
    let object = require_object(payload)?;
    Ok(AnalysisScores {
        spots: score_field(object, &["spots_score", "spots"], FALLBACK_SCORES.spots),
        moisture: score_field(object, &["moisture_score", "moisture"], FALLBACK_SCORES.moisture),
        texture: score_field(object, &["texture_score", "texture"], FALLBACK_SCORES.texture),
        dark_circles: score_field(
            object,
            &["dark_circle_score", "dark_circles"],
            FALLBACK_SCORES.dark_circles,
        ),
    })
}

/// Web search response: the top result becomes the insight.
pub fn adapt_search(payload: &JsonValue) -> Result<ResearchInsight, ShapeError> {
    require_object(payload)?;
    let top = payload
        .get("results")
        .and_then(JsonValue::as_array)
        .and_then(|results| results.first())
        .ok_or(ShapeError::Empty("results"))?;

    let insight = non_empty_str(top, "description").ok_or(ShapeError::MissingField("description"))?;
    let source_url = non_empty_str(top, "url").ok_or(ShapeError::MissingField("url"))?;
    let source_title = non_empty_str(top, "title").unwrap_or(source_url);

    Ok(ResearchInsight {
        insight: insight.to_string(),
        source_title: source_title.to_string(),
        source_url: source_url.to_string(),
    })
}

/// Content store query response holding product documents.
///
/// Documents without `_id` or `name` are dropped; at most
/// [`MAX_PRODUCTS`] are kept. An empty list is rejected.
pub fn adapt_products(payload: &JsonValue) -> Result<Vec<Product>, ShapeError> {
    let documents = query_result(payload)?;
    let products: Vec<Product> = documents
        .iter()
        .filter_map(|doc| serde_json::from_value(doc.clone()).ok())
        .take(MAX_PRODUCTS)
        .collect();

    if products.is_empty() {
        return Err(ShapeError::Empty("result"));
    }
    Ok(products)
}

/// Content store query response holding scan records. May be empty.
pub fn adapt_scan_records(payload: &JsonValue) -> Result<Vec<ScanRecord>, ShapeError> {
    let documents = query_result(payload)?;
    Ok(documents
        .iter()
        .filter_map(|doc| serde_json::from_value(doc.clone()).ok())
        .collect())
}

fn query_result(payload: &JsonValue) -> Result<&Vec<JsonValue>, ShapeError> {
    require_object(payload)?;
    payload
        .get("result")
        .and_then(JsonValue::as_array)
        .ok_or(ShapeError::MissingField("result"))
}

/// Temporary speech-agent key.
pub fn adapt_speech_key(payload: &JsonValue) -> Result<String, ShapeError> {
    require_object(payload)?;
    non_empty_str(payload, "key")
        .map(str::to_string)
        .ok_or(ShapeError::MissingField("key"))
}

/// OAuth client-credentials token.
pub fn adapt_access_token(payload: &JsonValue) -> Result<String, ShapeError> {
    require_object(payload)?;
    non_empty_str(payload, "access_token")
        .map(str::to_string)
        .ok_or(ShapeError::MissingField("access_token"))
}
