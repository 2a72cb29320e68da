//! Wire types for the native endpoints.
//!
//! Byte fields use `serde_bytes` so they travel as MessagePack `bin` values.

use serde::{Deserialize, Serialize};
pub use serde_bytes::ByteBuf;

use crate::audio::AudioFormat;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncodeRequest {
    #[serde(default)]
    pub audios: Vec<ByteBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodeResponse {
    pub tokens: Vec<Vec<u32>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeRequest {
    #[serde(default)]
    pub tokens: Vec<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeResponse {
    pub audios: Vec<ByteBuf>,
}

/// Reference sample for voice cloning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAudio {
    pub audio: ByteBuf,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCache {
    On,
    #[default]
    Off,
}

/// Native synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsRequest {
    pub text: String,

    #[serde(default = "default_chunk_length")]
    pub chunk_length: usize,

    #[serde(default)]
    pub format: AudioFormat,

    #[serde(default)]
    pub references: Vec<ReferenceAudio>,

    #[serde(default)]
    pub reference_id: Option<String>,

    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub use_memory_cache: MemoryCache,

    #[serde(default = "default_true")]
    pub normalize: bool,

    #[serde(default)]
    pub streaming: bool,

    /// `0` means the model maximum.
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl TtsRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunk_length: default_chunk_length(),
            format: AudioFormat::default(),
            references: Vec::new(),
            reference_id: None,
            seed: None,
            use_memory_cache: MemoryCache::default(),
            normalize: true,
            streaming: false,
            max_new_tokens: default_max_new_tokens(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
            temperature: default_temperature(),
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

fn default_chunk_length() -> usize {
    200
}
fn default_true() -> bool {
    true
}
fn default_max_new_tokens() -> usize {
    1024
}
fn default_top_p() -> f32 {
    0.8
}
fn default_repetition_penalty() -> f32 {
    1.1
}
fn default_temperature() -> f32 {
    0.8
}
