//! Audio capture sources for a voice session.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// Bytes per frame read from a byte stream: 20 ms of 16 kHz 16-bit mono.
pub const DEFAULT_FRAME_SIZE: usize = 640;

/// A source of captured audio frames.
///
/// The session owns its source and calls [`AudioSource::release`] exactly
/// once when it ends, on every exit path.
#[async_trait]
pub trait AudioSource: Send {
    /// Next frame, or `None` once capture has ended.
    async fn next_frame(&mut self) -> Option<Vec<u8>>;

    /// Release the capture device.
    async fn release(&mut self);
}

/// Frames pushed by another task through a bounded channel.
#[derive(Debug)]
pub struct ChannelAudioSource {
    frames: mpsc::Receiver<Vec<u8>>,
}

impl ChannelAudioSource {
    /// The returned sender observes `is_closed()` once the source is released.
    pub fn new(capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { frames: rx })
    }
}

#[async_trait]
impl AudioSource for ChannelAudioSource {
    async fn next_frame(&mut self) -> Option<Vec<u8>> {
        self.frames.recv().await
    }

    async fn release(&mut self) {
        self.frames.close();
        tracing::debug!("Audio channel released");
    }
}

/// Fixed-size frames read from a byte stream such as stdin.
#[derive(Debug)]
pub struct ReaderAudioSource<R> {
    reader: R,
    frame_size: usize,
    released: bool,
}

impl<R> ReaderAudioSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self::with_frame_size(reader, DEFAULT_FRAME_SIZE)
    }

    pub fn with_frame_size(reader: R, frame_size: usize) -> Self {
        Self {
            reader,
            frame_size: frame_size.max(1),
            released: false,
        }
    }
}

#[async_trait]
impl<R> AudioSource for ReaderAudioSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.released {
            return None;
        }
        let mut frame = vec![0u8; self.frame_size];
        match self.reader.read(&mut frame).await {
            Ok(0) => None,
            Ok(n) => {
                frame.truncate(n);
                Some(frame)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Audio read failed, ending capture");
                None
            }
        }
    }

    async fn release(&mut self) {
        self.released = true;
    }
}
