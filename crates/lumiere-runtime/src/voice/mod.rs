//! Voice agent channel.
//!
//! The tool manifest and dispatch rules live in `lumiere_core::voice`;
//! this module owns the socket, the audio source and their lifetimes.

mod audio;
mod controller;
mod session;

pub use audio::{AudioSource, ChannelAudioSource, ReaderAudioSource, DEFAULT_FRAME_SIZE};
pub use controller::VoiceController;
pub use session::{SessionOptions, VoiceError, VoiceSession, VoiceState};
