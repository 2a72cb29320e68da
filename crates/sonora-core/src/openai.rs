//! OpenAI-compatible speech request adapter.
//!
//! The adapter is a pure translation onto the native [`TtsRequest`]; it never
//! subclasses or extends the native type. Voice and model selection have no
//! native counterpart and are dropped, so every adapted request is synthesized
//! without a reference (random voice) on the batch path.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::audio::AudioFormat;
use crate::error::{Error, Result};
use crate::schema::TtsRequest;

/// Longest `input` accepted, in characters.
pub const MAX_INPUT_CHARS: usize = 4096;

const SPEED_RANGE: RangeInclusive<f32> = 0.25..=4.0;

/// OpenAI `POST /v1/audio/speech` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiSpeechRequest {
    /// Accepted for compatibility, ignored.
    #[serde(default = "default_model")]
    pub model: String,
    pub input: String,
    /// Accepted for compatibility, ignored.
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Kept as a string so that unknown values degrade to WAV instead of failing.
    #[serde(default = "default_response_format")]
    pub response_format: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

impl OpenAiSpeechRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            model: default_model(),
            input: input.into(),
            voice: default_voice(),
            response_format: default_response_format(),
            speed: default_speed(),
        }
    }

    /// Checks that must pass before the pipeline is invoked.
    pub fn validate(&self) -> Result<()> {
        let length = self.input.chars().count();
        if length > MAX_INPUT_CHARS {
            return Err(Error::TextTooLong {
                length,
                max: MAX_INPUT_CHARS,
            });
        }
        if !SPEED_RANGE.contains(&self.speed) {
            return Err(Error::InvalidInput(format!(
                "speed must be between {} and {}, got {}",
                SPEED_RANGE.start(),
                SPEED_RANGE.end(),
                self.speed
            )));
        }
        Ok(())
    }
}

fn default_model() -> String {
    "tts-1".to_string()
}
fn default_voice() -> String {
    "alloy".to_string()
}
fn default_response_format() -> String {
    "mp3".to_string()
}
fn default_speed() -> f32 {
    1.0
}

/// Response formats named by the OpenAI API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAiResponseFormat {
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
}

impl OpenAiResponseFormat {
    pub const ALL: [OpenAiResponseFormat; 6] = [
        OpenAiResponseFormat::Mp3,
        OpenAiResponseFormat::Opus,
        OpenAiResponseFormat::Aac,
        OpenAiResponseFormat::Flac,
        OpenAiResponseFormat::Wav,
        OpenAiResponseFormat::Pcm,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "opus" => Some(Self::Opus),
            "aac" => Some(Self::Aac),
            "flac" => Some(Self::Flac),
            "wav" => Some(Self::Wav),
            "pcm" => Some(Self::Pcm),
            _ => None,
        }
    }

    /// Native format actually produced. Codecs without a native encoder fall back to WAV.
    pub fn native(self) -> AudioFormat {
        match self {
            Self::Mp3 => AudioFormat::Mp3,
            Self::Pcm => AudioFormat::Pcm,
            Self::Wav | Self::Opus | Self::Aac | Self::Flac => AudioFormat::Wav,
        }
    }
}

/// Map an OpenAI `response_format` string; unknown names resolve to WAV.
pub fn map_response_format(name: &str) -> AudioFormat {
    OpenAiResponseFormat::parse(name)
        .map(OpenAiResponseFormat::native)
        .unwrap_or(AudioFormat::Wav)
}

/// Translate an OpenAI request into the native shape.
pub fn adapt_request(request: &OpenAiSpeechRequest) -> TtsRequest {
    let mut native = TtsRequest::new(request.input.clone())
        .with_format(map_response_format(&request.response_format))
        .streaming(false);
    native.reference_id = None;
    native.references = Vec::new();
    native.normalize = true;
    native
}

/// Sample rate declared in the written file for a given speed.
///
/// Speed is applied by relabelling the rate instead of resampling, which
/// shifts pitch together with duration.
pub fn output_sample_rate(native_rate: u32, speed: f32) -> u32 {
    if speed == 1.0 {
        native_rate
    } else {
        (native_rate as f64 * speed as f64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_total() {
        for format in OpenAiResponseFormat::ALL {
            assert!(AudioFormat::ALL.contains(&format.native()));
        }
        assert_eq!(map_response_format("opus"), AudioFormat::Wav);
        assert_eq!(map_response_format("aac"), AudioFormat::Wav);
        assert_eq!(map_response_format("flac"), AudioFormat::Wav);
        assert_eq!(map_response_format("mp3"), AudioFormat::Mp3);
        assert_eq!(map_response_format("wav"), AudioFormat::Wav);
        assert_eq!(map_response_format("pcm"), AudioFormat::Pcm);
    }

    #[test]
    fn unknown_formats_degrade_to_wav() {
        assert_eq!(map_response_format("vorbis"), AudioFormat::Wav);
        assert_eq!(map_response_format(""), AudioFormat::Wav);
    }

    #[test]
    fn adapt_is_reference_free_batch() {
        let mut request = OpenAiSpeechRequest::new("Hello");
        request.voice = "nova".to_string();
        request.model = "tts-1-hd".to_string();
        request.response_format = "opus".to_string();

        let native = adapt_request(&request);
        assert_eq!(native.text, "Hello");
        assert_eq!(native.format, AudioFormat::Wav);
        assert!(!native.streaming);
        assert!(native.normalize);
        assert!(native.reference_id.is_none());
        assert!(native.references.is_empty());
    }

    #[test]
    fn adapt_is_deterministic() {
        let request = OpenAiSpeechRequest::new("Same input");
        assert_eq!(adapt_request(&request), adapt_request(&request));
    }

    #[test]
    fn input_limit_is_4096_chars() {
        assert!(OpenAiSpeechRequest::new("é".repeat(MAX_INPUT_CHARS))
            .validate()
            .is_ok());
        let err = OpenAiSpeechRequest::new("a".repeat(MAX_INPUT_CHARS + 1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::TextTooLong { max: 4096, .. }));
    }

    #[test]
    fn speed_scales_declared_rate() {
        assert_eq!(output_sample_rate(44_100, 2.0), 88_200);
        assert_eq!(output_sample_rate(44_100, 1.0), 44_100);
        assert_eq!(output_sample_rate(44_100, 0.5), 22_050);
    }

    #[test]
    fn defaults_follow_openai() {
        let request: OpenAiSpeechRequest = serde_json::from_str(r#"{"input": "hi"}"#).unwrap();
        assert_eq!(request.response_format, "mp3");
        assert_eq!(request.speed, 1.0);
        let mut slow = request.clone();
        slow.speed = 0.1;
        assert!(slow.validate().is_err());
    }
}
