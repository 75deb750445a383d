//! Terminal voice session.
//!
//! Audio is read from stdin. A `trigger_camera_scan` call re-runs analysis
//! on the configured image and refreshes the recommendations the agent can
//! add to the cart.

use anyhow::Context;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use lumiere_core::recommendation::{target_issue_for, DEFAULT_TARGET_ISSUE};
use lumiere_core::{CaptureError, ToolDispatcher};
use lumiere_runtime::providers::CredentialSource;
use lumiere_runtime::{
    ApiCredential, ClinicService, ReaderAudioSource, RuntimeConfig, SessionOptions, VoiceController,
    VoiceState,
};

pub async fn run(service: Arc<ClinicService>, config: &RuntimeConfig, image: Option<String>) -> anyhow::Result<()> {
    let grant = service.voice_session_config().await;
    if let Some(warning) = &grant.value.warning {
        warn!(warning = %warning, source = ?grant.source_label(), "Voice session degraded");
    }
    let grant = grant.value;

    let (capture_tx, mut capture_rx) = mpsc::unbounded_channel::<()>();
    let capture = move || {
        capture_tx
            .send(())
            .map_err(|e| CaptureError(e.to_string()))
    };
    let dispatcher = Arc::new(Mutex::new(
        ToolDispatcher::new(&grant.config.tools, Box::new(capture)).context("invalid voice tool manifest")?,
    ));

    let initial = service.products_by_issue(DEFAULT_TARGET_ISSUE).await.value;
    dispatcher.lock().set_recommendations(initial);

    let options = SessionOptions {
        url: config.voice.agent_url.clone(),
        api_key: ApiCredential::new(grant.api_key, CredentialSource::Programmatic, "voice session key"),
        agent: grant.config,
        connect_timeout: config.voice.connect_timeout,
    };

    let controller = VoiceController::new();
    let audio = ReaderAudioSource::new(tokio::io::stdin());
    let mut state = controller
        .start(options, Box::new(audio), dispatcher.clone())
        .await
        .context("failed to start voice session")?;

    let scans = tokio::spawn({
        let service = service.clone();
        let dispatcher = dispatcher.clone();
        async move {
            while capture_rx.recv().await.is_some() {
                let Some(image) = image.as_deref() else {
                    warn!("Camera scan requested but no image was given");
                    continue;
                };
                let analysis = service.analyze(image).await;
                let issue = target_issue_for(&analysis.value);
                let products = service.products_by_issue(issue).await.value;
                info!(
                    target_issue = issue,
                    products = products.len(),
                    source = ?analysis.source_label(),
                    "Camera scan analysed"
                );
                dispatcher.lock().set_recommendations(products);
            }
        }
    });

    tokio::select! {
        _ = state.wait_for(|s| *s == VoiceState::Closed) => info!("Voice session closed"),
        _ = tokio::signal::ctrl_c() => info!("Stopping voice session"),
    }

    controller.stop().await;
    scans.abort();

    let cart = dispatcher.lock().cart().clone();
    info!(items = cart.len(), total = cart.total_price(), "Final cart");
    Ok(())
}
