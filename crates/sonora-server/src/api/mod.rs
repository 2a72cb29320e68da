//! API routes and handlers

pub mod internal;
pub mod msgpack;
pub mod openai;
pub mod response;
mod router;
pub mod tts;
pub mod vqgan;

pub use router::create_router;

/// Raised body cap for routes that carry audio.
pub(crate) const AUDIO_BODY_LIMIT_BYTES: usize = 64 * 1024 * 1024;
