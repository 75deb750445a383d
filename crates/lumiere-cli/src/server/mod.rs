//! HTTP surface.
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | POST | `/api/analyze` | [`routes::analyze`] |
//! | POST | `/api/clinical-insights` | [`routes::clinical_insights`] |
//! | POST | `/api/products` | [`routes::products`] |
//! | POST | `/api/generate-pdf` | [`routes::generate_pdf`] |
//! | GET | `/api/voice` | [`routes::voice_config`] |
//! | GET, POST | `/api/scans` | [`routes::list_scans`], [`routes::record_scan`] |
//! | GET | `/health` | [`routes::health`] |

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::info;

use lumiere_runtime::ClinicService;

pub mod error;
pub mod routes;

pub use error::AppError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ClinicService>,
}

pub fn build_router(service: Arc<ClinicService>) -> Router {
    Router::new()
        .route("/api/analyze", post(routes::analyze))
        .route("/api/clinical-insights", post(routes::clinical_insights))
        .route("/api/products", post(routes::products))
        .route("/api/generate-pdf", post(routes::generate_pdf))
        .route("/api/voice", get(routes::voice_config))
        .route("/api/scans", get(routes::list_scans).post(routes::record_scan))
        .route("/health", get(routes::health))
        .with_state(AppState { service })
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve(service: Arc<ClinicService>, bind: &str) -> anyhow::Result<()> {
    let app = build_router(service);

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!(address = %bind, "Lumiere clinic server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
