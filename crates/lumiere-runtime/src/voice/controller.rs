//! At most one voice session at a time.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

use lumiere_core::ToolDispatcher;

use super::audio::AudioSource;
use super::session::{SessionOptions, VoiceError, VoiceSession, VoiceState};

/// The controller's single session slot.
#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    /// Reserved by the start call holding this ticket.
    Connecting(u64),
    Live(VoiceSession),
}

#[derive(Debug, Default)]
struct Inner {
    slot: Slot,
    next_ticket: u64,
}

/// Owns the active voice session.
///
/// Starting while a session is connecting or live is rejected with
/// [`VoiceError::AlreadyActive`]; a closed session may be replaced. The
/// slot lock is never held across the connect, so [`state`](Self::state)
/// and [`stop`](Self::stop) stay responsive while a session comes up.
#[derive(Debug, Default)]
pub struct VoiceController {
    inner: Mutex<Inner>,
}

impl VoiceController {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(
        &self,
        options: SessionOptions,
        mut audio: Box<dyn AudioSource>,
        dispatcher: Arc<Mutex<ToolDispatcher>>,
    ) -> Result<watch::Receiver<VoiceState>, VoiceError> {
        let ticket = match self.reserve() {
            Some(ticket) => ticket,
            None => {
                audio.release().await;
                return Err(VoiceError::AlreadyActive);
            }
        };

        let started = VoiceSession::start(options, audio, dispatcher).await;

        let abandoned = {
            let mut inner = self.inner.lock();
            let reserved = matches!(inner.slot, Slot::Connecting(t) if t == ticket);
            match started {
                Ok(session) if reserved => {
                    let state = session.subscribe();
                    inner.slot = Slot::Live(session);
                    return Ok(state);
                }
                Ok(session) => session,
                Err(e) => {
                    if reserved {
                        inner.slot = Slot::Empty;
                    }
                    return Err(e);
                }
            }
        };

        tracing::info!("Voice session stopped while connecting");
        abandoned.stop().await;
        Err(VoiceError::Cancelled)
    }

    /// Claim the slot, or `None` if a session is connecting or live.
    fn reserve(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        let busy = match &inner.slot {
            Slot::Empty => false,
            Slot::Connecting(_) => true,
            Slot::Live(session) => !session.is_closed(),
        };
        if busy {
            return None;
        }

        let ticket = inner.next_ticket;
        inner.next_ticket += 1;
        inner.slot = Slot::Connecting(ticket);
        Some(ticket)
    }

    /// Stop the active session, if any. A session still connecting is
    /// abandoned and shut down once the connect completes.
    pub async fn stop(&self) {
        let slot = std::mem::take(&mut self.inner.lock().slot);
        if let Slot::Live(session) = slot {
            session.stop().await;
        }
    }

    /// State of the current session; `Idle` when there is none.
    pub fn state(&self) -> VoiceState {
        match &self.inner.lock().slot {
            Slot::Empty => VoiceState::Idle,
            Slot::Connecting(_) => VoiceState::Connecting,
            Slot::Live(session) => session.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::session::testing::{dispatcher, options, spawn_agent};
    use crate::voice::ChannelAudioSource;
    use futures::StreamExt;

    async fn hold_open(mut ws: crate::voice::session::testing::AgentSocket) {
        while let Some(Ok(_)) = ws.next().await {}
    }

    #[tokio::test]
    async fn test_second_session_rejected() {
        let url = spawn_agent(hold_open).await;
        let controller = VoiceController::new();

        let (_first_tx, first) = ChannelAudioSource::new(1);
        controller
            .start(options(url.clone()), Box::new(first), dispatcher())
            .await
            .unwrap();
        assert_eq!(controller.state(), VoiceState::Listening);

        let (second_tx, second) = ChannelAudioSource::new(1);
        let err = controller
            .start(options(url), Box::new(second), dispatcher())
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::AlreadyActive));
        assert!(second_tx.is_closed());

        controller.stop().await;
        assert_eq!(controller.state(), VoiceState::Idle);
    }

    #[tokio::test]
    async fn test_closed_session_can_be_replaced() {
        let first_url = spawn_agent(|mut ws| async move {
            let _ = ws.next().await;
            let _ = ws.close(None).await;
        })
        .await;
        let second_url = spawn_agent(hold_open).await;
        let controller = VoiceController::new();

        let (_tx, audio) = ChannelAudioSource::new(1);
        let mut state = controller
            .start(options(first_url), Box::new(audio), dispatcher())
            .await
            .unwrap();
        state.wait_for(|s| *s == VoiceState::Closed).await.unwrap();

        let (_tx, audio) = ChannelAudioSource::new(1);
        controller
            .start(options(second_url), Box::new(audio), dispatcher())
            .await
            .unwrap();
        assert_eq!(controller.state(), VoiceState::Listening);
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_state_responsive_while_connecting() {
        // Accepts TCP but never completes the websocket handshake.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (held_tx, held_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ = held_tx.send(stream);
        });

        let controller = Arc::new(VoiceController::new());
        let starting = {
            let controller = controller.clone();
            tokio::spawn(async move {
                let (_tx, audio) = ChannelAudioSource::new(1);
                controller.start(options(url), Box::new(audio), dispatcher()).await
            })
        };

        let stalled = held_rx.await.unwrap();
        assert_eq!(controller.state(), VoiceState::Connecting);

        let (second_tx, second) = ChannelAudioSource::new(1);
        let err = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            controller.start(options("ws://127.0.0.1:9".to_string()), Box::new(second), dispatcher()),
        )
        .await
        .expect("start must not wait on the pending connect")
        .unwrap_err();
        assert!(matches!(err, VoiceError::AlreadyActive));
        assert!(second_tx.is_closed());

        tokio::time::timeout(std::time::Duration::from_secs(1), controller.stop())
            .await
            .expect("stop must not wait on the pending connect");
        assert_eq!(controller.state(), VoiceState::Idle);

        drop(stalled);
        assert!(starting.await.unwrap().is_err());
        assert_eq!(controller.state(), VoiceState::Idle);
    }

    #[tokio::test]
    async fn test_stop_during_connect_cancels_session() {
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
        use tokio_tungstenite::tungstenite::http::HeaderValue;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (accepted_tx, accepted_rx) = tokio::sync::oneshot::channel();
        let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ = accepted_tx.send(());
            let _ = go_rx.await;
            let callback = |_request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
                response
                    .headers_mut()
                    .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("token"));
                Ok(response)
            };
            if let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await {
                hold_open(ws).await;
            }
        });

        let controller = Arc::new(VoiceController::new());
        let (audio_tx, audio) = ChannelAudioSource::new(1);
        let starting = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.start(options(url), Box::new(audio), dispatcher()).await })
        };

        accepted_rx.await.unwrap();
        controller.stop().await;
        go_tx.send(()).unwrap();

        let err = starting.await.unwrap().unwrap_err();
        assert!(matches!(err, VoiceError::Cancelled));
        assert!(audio_tx.is_closed());
        assert_eq!(controller.state(), VoiceState::Idle);
    }
}
