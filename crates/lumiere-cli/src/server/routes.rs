//! Endpoint handlers.
//!
//! Bodies are read as raw bytes and parsed here, so an unreadable body can
//! still be answered with an emergency payload instead of axum's rejection.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use lumiere_core::fallbacks::{
    emergency_regimen, ANALYSIS_EMERGENCY_SOURCE, EMERGENCY_REGIMEN_SOURCE, EMERGENCY_SCORES,
};
use lumiere_core::recommendation::{normalize_issue, target_issue_for};
use lumiere_core::report::REPORT_FILENAME;
use lumiere_core::{AnalysisScores, Product, ResearchInsight, ScanRecord};
use lumiere_runtime::{Resolution, VoiceSessionGrant};

use super::{AppError, AppState};

/// User id recorded for scans submitted without one.
pub const ANONYMOUS_USER: &str = "demo-user";

/// Header carrying the fallback source on binary responses.
pub const SOURCE_HEADER: &str = "x-lumiere-source";

/// Unwrap a resolution, refusing fallbacks in strict mode.
fn settle<T>(state: &AppState, resolution: Resolution<T>) -> Result<(T, Option<String>), AppError> {
    if state.service.strict_mode() {
        return Ok((resolution.into_strict()?, None));
    }
    let source = resolution.source_label().map(str::to_string);
    Ok((resolution.value, source))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lenient product list: entries that are not products are skipped.
fn products_from(values: Vec<JsonValue>) -> Vec<Product> {
    values
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

fn scores_from(value: Option<JsonValue>) -> Option<AnalysisScores> {
    value
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v).ok())
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    image: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    success: bool,
    scores: AnalysisScores,
    target_issue: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

pub async fn analyze(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request: AnalyzeRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            if state.service.strict_mode() {
                return Err(AppError::MalformedPayload);
            }
            warn!(error = %e, "Unreadable analysis request, serving emergency scores");
            return Ok(Json(AnalyzeResponse {
                success: true,
                scores: EMERGENCY_SCORES,
                target_issue: target_issue_for(&EMERGENCY_SCORES),
                source: Some(ANALYSIS_EMERGENCY_SOURCE.to_string()),
            })
            .into_response());
        }
    };

    let image = non_empty(request.image).ok_or(AppError::ImageRequired)?;
    let (scores, source) = settle(&state, state.service.analyze(&image).await)?;

    Ok(Json(AnalyzeResponse {
        success: true,
        target_issue: target_issue_for(&scores),
        scores,
        source,
    })
    .into_response())
}

#[derive(Deserialize)]
struct InsightRequest {
    #[serde(default)]
    concern: Option<String>,
}

#[derive(Serialize)]
struct InsightResponse {
    success: bool,
    #[serde(flatten)]
    insight: ResearchInsight,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

pub async fn clinical_insights(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request: InsightRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            if state.service.strict_mode() {
                return Err(AppError::MalformedPayload);
            }
            warn!(error = %e, "Unreadable insight request");
            return Ok(Json(json!({
                "success": false,
                "error": "Clinical Research Node Offline",
            }))
            .into_response());
        }
    };

    let concern = non_empty(request.concern).ok_or(AppError::ConcernRequired)?;
    let (insight, source) = settle(&state, state.service.research_insight(&concern).await)?;

    Ok(Json(InsightResponse {
        success: true,
        insight,
        source,
    })
    .into_response())
}

#[derive(Deserialize)]
struct ProductsRequest {
    #[serde(default, rename = "targetIssue")]
    target_issue: Option<String>,
}

#[derive(Serialize)]
struct ProductsResponse {
    success: bool,
    products: Vec<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

pub async fn products(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request: ProductsRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            if state.service.strict_mode() {
                return Err(AppError::MalformedPayload);
            }
            warn!(error = %e, "Unreadable products request, serving emergency regimen");
            return Ok(Json(ProductsResponse {
                success: true,
                products: emergency_regimen(),
                source: Some(EMERGENCY_REGIMEN_SOURCE.to_string()),
            })
            .into_response());
        }
    };

    let issue = normalize_issue(request.target_issue.as_deref());
    let (products, source) = settle(&state, state.service.products_by_issue(&issue).await)?;

    Ok(Json(ProductsResponse {
        success: true,
        products,
        source,
    })
    .into_response())
}

#[derive(Deserialize)]
struct ReportRequest {
    #[serde(default)]
    scores: Option<JsonValue>,
    #[serde(default)]
    products: Vec<JsonValue>,
}

pub async fn generate_pdf(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request: ReportRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Unreadable report request");
        AppError::ReportInterrupted
    })?;

    let scores = scores_from(request.scores).ok_or(AppError::ScoresRequired)?;
    let products = products_from(request.products);
    let (pdf, source) = settle(&state, state.service.clinical_report(&scores, &products).await)?;

    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", REPORT_FILENAME),
            ),
        ],
        pdf,
    )
        .into_response();

    if let Some(value) = source.and_then(|s| HeaderValue::from_str(&s).ok()) {
        response.headers_mut().insert(SOURCE_HEADER, value);
    }
    Ok(response)
}

#[derive(Serialize)]
struct VoiceResponse {
    #[serde(flatten)]
    grant: VoiceSessionGrant,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

pub async fn voice_config(State(state): State<AppState>) -> Result<Response, AppError> {
    let (grant, source) = settle(&state, state.service.voice_session_config().await)?;
    Ok(Json(VoiceResponse { grant, source }).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    scores: Option<JsonValue>,
    #[serde(default)]
    products: Vec<JsonValue>,
}

#[derive(Serialize)]
struct ScanResponse {
    success: bool,
    scan: ScanRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

pub async fn record_scan(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request: ScanRequest = serde_json::from_slice(&body).map_err(|_| AppError::MalformedPayload)?;
    let scores = scores_from(request.scores).ok_or(AppError::ScoresRequired)?;
    let user = non_empty(request.user_id).unwrap_or_else(|| ANONYMOUS_USER.to_string());

    let record = ScanRecord::new(user, scores, &products_from(request.products));
    let ((), source) = settle(&state, state.service.record_scan(record.clone()).await)?;

    Ok(Json(ScanResponse {
        success: true,
        scan: record,
        source,
    })
    .into_response())
}

#[derive(Serialize)]
struct ScanListResponse {
    success: bool,
    scans: Vec<ScanRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

pub async fn list_scans(State(state): State<AppState>) -> Result<Response, AppError> {
    let (scans, source) = settle(&state, state.service.recent_scans().await)?;
    Ok(Json(ScanListResponse {
        success: true,
        scans,
        source,
    })
    .into_response())
}

pub async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::super::build_router;
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{HeaderMap, Method, Request},
        Router,
    };
    use lumiere_runtime::providers::SanityStore;
    use lumiere_runtime::ClinicService;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(Arc::new(ClinicService::builder().build()))
    }

    fn strict_app() -> Router {
        build_router(Arc::new(ClinicService::builder().strict_mode(true).build()))
    }

    async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, HeaderMap, Bytes) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes)
    }

    fn json_of(bytes: &Bytes) -> JsonValue {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_requires_image() {
        let (status, _, body) = send(app(), Method::POST, "/api/analyze", r#"{}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["error"], "Image is required");
    }

    #[tokio::test]
    async fn test_analyze_fallback_scores() {
        let (status, _, body) = send(
            app(),
            Method::POST,
            "/api/analyze",
            r#"{"image":"data:image/jpeg;base64,aGVsbG8="}"#,
        )
        .await;
        let body = json_of(&body);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["source"], "Lumiere_Neural_Engine_Fallback");
        assert_eq!(body["scores"], json!({"spots": 78, "moisture": 42, "texture": 85, "darkCircles": 64}));
        assert_eq!(body["targetIssue"], "hydration");
    }

    #[tokio::test]
    async fn test_analyze_unreadable_body_serves_emergency() {
        let (status, _, body) = send(app(), Method::POST, "/api/analyze", "not json").await;
        let body = json_of(&body);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "Lumiere_Emergency_Mock");
        assert_eq!(body["scores"]["spots"], 80);
    }

    #[tokio::test]
    async fn test_insights_require_concern() {
        let (status, _, body) = send(app(), Method::POST, "/api/clinical-insights", r#"{"concern":"  "}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["error"], "Concern is required");
    }

    #[tokio::test]
    async fn test_insights_knowledge_base() {
        let (status, _, body) = send(app(), Method::POST, "/api/clinical-insights", r#"{"concern":"texture"}"#).await;
        let body = json_of(&body);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "Lumiere_Internal_Knowledge_Base");
        assert_eq!(body["sourceTitle"], "Clinical Texture Restoration Protocols");
        assert!(body["insight"].as_str().unwrap().contains("fractional lasers"));
    }

    #[tokio::test]
    async fn test_products_curated_regimen() {
        let (status, _, body) = send(app(), Method::POST, "/api/products", r#"{"targetIssue":"hydration"}"#).await;
        let body = json_of(&body);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["source"], "Lumiere_Curated_Regimen_Mock");
        let products = body["products"].as_array().unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0]["_id"], "mock_h1");
        assert_eq!(products[1]["_id"], "mock_h2");
    }

    /// Content store answering every product query with no results.
    async fn empty_store_url() -> String {
        let store = Router::new().route(
            "/v2024-01-01/data/query/production",
            axum::routing::get(|| async { axum::Json(json!({ "result": [] })) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, store).await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_products_empty_store_serves_curated_regimen() {
        let store = SanityStore::new("proj", "production").with_base_url(empty_store_url().await);
        let app = build_router(Arc::new(ClinicService::builder().content_store(Arc::new(store)).build()));

        let (status, _, body) = send(app, Method::POST, "/api/products", r#"{"targetIssue":"texture"}"#).await;
        let body = json_of(&body);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "Lumiere_Curated_Regimen_Mock");
        let products = body["products"].as_array().unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0]["_id"], "mock_h1");
    }

    #[tokio::test]
    async fn test_products_unreadable_body_serves_emergency() {
        let (_, _, body) = send(app(), Method::POST, "/api/products", "").await;
        let body = json_of(&body);

        assert_eq!(body["source"], "Lumiere_Emergency_Regimen");
        assert_eq!(body["products"][0]["_id"], "emergency_1");
    }

    #[tokio::test]
    async fn test_generate_pdf_fallback_document() {
        let (status, headers, body) = send(
            app(),
            Method::POST,
            "/api/generate-pdf",
            r#"{"scores":{"spots":78,"moisture":42,"texture":85,"darkCircles":64},"products":[{"_id":"mock_h1","name":"Hydra-Restore Bio-Serum","price":124}]}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Lumiere-Clinical-Report.pdf\""
        );
        assert_eq!(headers[SOURCE_HEADER], "Lumiere_In_Memory_Report");
        assert!(body.starts_with(b"%PDF-1.4"));
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("Hydra-Restore Bio-Serum"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[tokio::test]
    async fn test_generate_pdf_requires_scores() {
        let (status, _, body) = send(app(), Method::POST, "/api/generate-pdf", r#"{"products":[]}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["error"], "Scores are required");
    }

    #[tokio::test]
    async fn test_voice_demo_config() {
        let (status, _, body) = send(app(), Method::GET, "/api/voice", "").await;
        let body = json_of(&body);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["apiKey"], "");
        assert_eq!(body["source"], "Lumiere_Voice_Demo_Config");
        assert!(body["warning"].is_string());
        assert_eq!(body["config"]["tools"][0]["name"], "trigger_camera_scan");
    }

    #[tokio::test]
    async fn test_scans_round_trip_through_archive() {
        let app = app();
        let (status, _, body) = send(
            app.clone(),
            Method::POST,
            "/api/scans",
            r#"{"userId":"u-1","scores":{"spots":78,"moisture":42,"texture":85,"darkCircles":64}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["source"], "Lumiere_Local_Archive");

        let (_, _, body) = send(app, Method::GET, "/api/scans", "").await;
        let body = json_of(&body);
        let scans = body["scans"].as_array().unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0]["userId"], "u-1");
    }

    #[tokio::test]
    async fn test_strict_mode_refuses_fallback() {
        let (status, _, body) = send(
            strict_app(),
            Method::POST,
            "/api/analyze",
            r#"{"image":"aGVsbG8="}"#,
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_of(&body)["fallback"], "Lumiere_Neural_Engine_Fallback");
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _, body) = send(app(), Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body), json!({"status": "ok"}));
    }
}
