//! Sonora Core - request dispatch for an audio codec and text-to-speech gateway
//!
//! The crate sits between an HTTP surface and a generative audio model:
//!
//! - [`codec::CodecGateway`] validates encode/decode requests and issues whole
//!   batches to the model runtime, with a content-addressed encode cache.
//! - [`tts::TtsPipeline`] validates synthesis requests and runs them either as a
//!   lazy, cancellable chunk stream or as a single batch call.
//! - [`openai`] translates OpenAI speech requests onto the native shape.
//! - [`audio`] holds the format tables and the encoders that produce response bytes.
//!
//! The model itself is reached only through [`runtime::SpeechRuntime`], passed in
//! as a shared handle.

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod openai;
pub mod runtime;
pub mod schema;
pub mod tts;

pub use audio::{AudioClip, AudioEncoder, AudioFormat};
pub use codec::CodecGateway;
pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use openai::{adapt_request, map_response_format, output_sample_rate, OpenAiSpeechRequest};
pub use runtime::{RuntimeHandle, SpeechRuntime, SynthesisRequest, SyntheticRuntime};
pub use schema::{DecodeRequest, DecodeResponse, EncodeRequest, EncodeResponse, TtsRequest};
pub use tts::{AudioChunk, AudioStream, SynthesizedAudio, TtsOutput, TtsPipeline};
