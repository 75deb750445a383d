//! A live duplex session with the speech agent.
//!
//! ```text
//! Idle -> Connecting -> Listening <-> ToolCallPending
//!                           |
//!                           v
//!                        Closed   (stop, remote close, channel error)
//! ```
//!
//! Audio frames go out as binary messages while they are captured.
//! Inbound tool-call requests are answered through the [`ToolDispatcher`].
//! There is no reconnect: a dropped channel ends the session.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use lumiere_core::voice::{InboundMessage, OutboundMessage};
use lumiere_core::{ToolDispatcher, VoiceAgentConfig};

use super::audio::AudioSource;
use crate::providers::ApiCredential;

type AgentStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors starting or running a voice session.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("voice agent connection failed: {0}")]
    Connect(String),

    #[error("voice agent key is empty or not a valid header value")]
    InvalidKey,

    #[error("voice agent connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("a voice session is already active")]
    AlreadyActive,

    #[error("failed to send to voice agent: {0}")]
    Send(String),

    #[error("voice session stopped while connecting")]
    Cancelled,
}

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Connecting,
    Listening,
    ToolCallPending,
    Closed,
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub url: String,
    pub api_key: ApiCredential,
    pub agent: VoiceAgentConfig,
    pub connect_timeout: Duration,
}

/// An owned voice session.
///
/// Dropping the session stops it; [`VoiceSession::stop`] additionally
/// waits until the audio source is released and the channel closed.
#[derive(Debug)]
pub struct VoiceSession {
    stop_tx: Option<oneshot::Sender<()>>,
    state_rx: watch::Receiver<VoiceState>,
    task: Option<JoinHandle<()>>,
}

impl VoiceSession {
    /// Connect, send the agent configuration and start relaying.
    ///
    /// The audio source is released on failure too.
    pub async fn start(
        options: SessionOptions,
        mut audio: Box<dyn AudioSource>,
        dispatcher: Arc<Mutex<ToolDispatcher>>,
    ) -> Result<Self, VoiceError> {
        let (state_tx, state_rx) = watch::channel(VoiceState::Idle);

        let ws = match connect(&options, &state_tx).await {
            Ok(ws) => ws,
            Err(e) => {
                audio.release().await;
                state_tx.send_replace(VoiceState::Closed);
                return Err(e);
            }
        };
        let (mut sink, stream) = ws.split();

        let settings = OutboundMessage::SettingsConfiguration {
            model: options.agent.model.clone(),
            instructions: options.agent.instructions.clone(),
            tools: options.agent.tools.clone(),
        };
        if let Err(e) = sink.send(Message::Text(settings.to_json())).await {
            audio.release().await;
            state_tx.send_replace(VoiceState::Closed);
            return Err(VoiceError::Send(e.to_string()));
        }

        state_tx.send_replace(VoiceState::Listening);
        tracing::info!(model = %options.agent.model, "Voice session listening");

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(relay(sink, stream, audio, dispatcher, state_tx, stop_rx));

        Ok(Self {
            stop_tx: Some(stop_tx),
            state_rx,
            task: Some(task),
        })
    }

    pub fn state(&self) -> VoiceState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<VoiceState> {
        self.state_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == VoiceState::Closed
    }

    /// Wait until the session closes on its own.
    pub async fn closed(&mut self) {
        // An error means the relay task is gone, which also means closed.
        let _ = self.state_rx.wait_for(|s| *s == VoiceState::Closed).await;
    }

    /// Stop the session and wait for cleanup.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Voice relay task ended abnormally");
            }
        }
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
    }
}

async fn connect(options: &SessionOptions, state: &watch::Sender<VoiceState>) -> Result<AgentStream, VoiceError> {
    if options.api_key.is_empty() {
        return Err(VoiceError::InvalidKey);
    }

    let mut request = options
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| VoiceError::Connect(e.to_string()))?;
    let protocol = HeaderValue::from_str(&format!("token, {}", options.api_key.expose()))
        .map_err(|_| VoiceError::InvalidKey)?;
    request.headers_mut().insert("Sec-WebSocket-Protocol", protocol);

    state.send_replace(VoiceState::Connecting);
    tracing::debug!(url = %options.url, "Connecting to voice agent");

    match tokio::time::timeout(options.connect_timeout, connect_async(request)).await {
        Ok(Ok((ws, _response))) => Ok(ws),
        Ok(Err(e)) => Err(VoiceError::Connect(e.to_string())),
        Err(_) => Err(VoiceError::Timeout(options.connect_timeout)),
    }
}

async fn relay(
    mut sink: SplitSink<AgentStream, Message>,
    mut stream: SplitStream<AgentStream>,
    mut audio: Box<dyn AudioSource>,
    dispatcher: Arc<Mutex<ToolDispatcher>>,
    state: watch::Sender<VoiceState>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut capturing = true;

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                tracing::info!("Voice session stopped");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            frame = audio.next_frame(), if capturing => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(Message::Binary(frame)).await {
                        tracing::warn!(error = %e, "Audio send failed, closing session");
                        break;
                    }
                }
                None => {
                    tracing::debug!("Audio capture ended");
                    capturing = false;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let InboundMessage::FunctionCallRequest(call) = InboundMessage::parse(&text) {
                        state.send_replace(VoiceState::ToolCallPending);
                        tracing::info!(tool = %call.name, call_id = %call.call_id, "Tool call requested");

                        let response = dispatcher.lock().dispatch(&call);
                        let reply = OutboundMessage::FunctionCallResponse(response).to_json();
                        if let Err(e) = sink.send(Message::Text(reply)).await {
                            tracing::warn!(error = %e, "Tool acknowledgment failed, closing session");
                            break;
                        }
                        state.send_replace(VoiceState::Listening);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Voice agent closed the channel");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Voice channel error");
                    break;
                }
            },
        }
    }

    audio.release().await;
    state.send_replace(VoiceState::Closed);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::future::Future;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    pub type AgentSocket = WebSocketStream<TcpStream>;

    /// A one-connection agent on a local port that accepts the `token`
    /// subprotocol and hands the socket to `handler`.
    pub async fn spawn_agent<F, Fut>(handler: F) -> String
    where
        F: FnOnce(AgentSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |_request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
                response
                    .headers_mut()
                    .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("token"));
                Ok(response)
            };
            let ws = accept_hdr_async(stream, callback).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{}", addr)
    }

    pub fn options(url: String) -> SessionOptions {
        SessionOptions {
            url,
            api_key: ApiCredential::new(
                "dg-key",
                crate::providers::CredentialSource::Programmatic,
                "test key",
            ),
            agent: VoiceAgentConfig::default(),
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn dispatcher() -> Arc<Mutex<ToolDispatcher>> {
        let tools = VoiceAgentConfig::default().tools;
        let capture = Box::new(|| Ok::<(), lumiere_core::CaptureError>(()));
        Arc::new(Mutex::new(ToolDispatcher::new(&tools, capture).unwrap()))
    }
}
