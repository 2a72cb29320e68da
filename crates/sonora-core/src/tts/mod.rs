//! Text-to-speech request pipeline.
//!
//! A request moves through validation, then either the streaming state
//! ([`AudioStream`]) or the batch state ([`SynthesizedAudio`]). All checks run
//! before the model is touched. Runtime failures are not retried; once chunks
//! have been handed to the transport they cannot be taken back, so a stream
//! that ends in an error must be treated as failed by the client.

mod stream;

pub use stream::{AudioChunk, AudioStream};

use std::ops::RangeInclusive;
use std::time::Instant;

use tracing::info;

use crate::audio::{decode_wav_bytes, AudioFormat};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::runtime::{runtime_failure, ReferenceClip, RuntimeHandle, SynthesisRequest};
use crate::schema::{MemoryCache, TtsRequest};

const CHUNK_LENGTH_RANGE: RangeInclusive<usize> = 100..=300;
const TOP_P_RANGE: RangeInclusive<f32> = 0.1..=1.0;
const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.1..=1.0;
const REPETITION_PENALTY_RANGE: RangeInclusive<f32> = 0.9..=2.0;

/// Complete audio from the batch path.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub request_id: String,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub generation_time_ms: f32,
}

impl SynthesizedAudio {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Real-time factor
    pub fn rtf(&self) -> f32 {
        let duration = self.duration_secs();
        if duration > 0.0 {
            (self.generation_time_ms / 1000.0) / duration
        } else {
            0.0
        }
    }
}

/// Outcome of dispatching a validated request.
pub enum TtsOutput {
    Stream(AudioStream),
    Batch(SynthesizedAudio),
}

pub struct TtsPipeline {
    runtime: RuntimeHandle,
    max_text_length: usize,
    max_num_samples: usize,
}

impl TtsPipeline {
    pub fn new(runtime: RuntimeHandle, config: &GatewayConfig) -> Self {
        Self {
            runtime,
            max_text_length: config.max_text_length,
            max_num_samples: config.max_num_samples.max(1),
        }
    }

    /// Check a request and turn it into the call the runtime will see.
    pub fn validate(&self, request: &TtsRequest) -> Result<SynthesisRequest> {
        let length = request.text.chars().count();
        if self.max_text_length > 0 && length > self.max_text_length {
            return Err(Error::TextTooLong {
                length,
                max: self.max_text_length,
            });
        }

        if request.streaming && request.format != AudioFormat::Wav {
            return Err(Error::UnsupportedStreamingFormat(request.format));
        }

        check_range("chunk_length", request.chunk_length, &CHUNK_LENGTH_RANGE)?;
        check_range("top_p", request.top_p, &TOP_P_RANGE)?;
        check_range("temperature", request.temperature, &TEMPERATURE_RANGE)?;
        check_range(
            "repetition_penalty",
            request.repetition_penalty,
            &REPETITION_PENALTY_RANGE,
        )?;

        let references = request
            .references
            .iter()
            .enumerate()
            .map(|(index, reference)| {
                let audio = decode_wav_bytes(&reference.audio).map_err(|err| match err {
                    Error::AudioDecode(msg) => {
                        Error::AudioDecode(format!("reference #{}: {}", index, msg))
                    }
                    other => other,
                })?;
                Ok(ReferenceClip {
                    audio,
                    text: reference.text.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SynthesisRequest {
            id: uuid::Uuid::new_v4().to_string(),
            text: request.text.clone(),
            references,
            reference_id: request.reference_id.clone(),
            seed: request.seed,
            use_memory_cache: request.use_memory_cache == MemoryCache::On,
            normalize: request.normalize,
            chunk_length: request.chunk_length,
            max_new_tokens: request.max_new_tokens,
            top_p: request.top_p,
            repetition_penalty: request.repetition_penalty,
            temperature: request.temperature,
            num_samples: self.max_num_samples,
            streaming: request.streaming,
        })
    }

    /// Enter the streaming or batch state for a request that already passed
    /// [`TtsPipeline::validate`].
    pub async fn dispatch(&self, synthesis: SynthesisRequest) -> Result<TtsOutput> {
        info!(
            "TTS request {}: {} chars, streaming {}",
            synthesis.id,
            synthesis.text.chars().count(),
            synthesis.streaming
        );

        if synthesis.streaming {
            Ok(TtsOutput::Stream(
                AudioStream::start(self.runtime.clone(), synthesis).await?,
            ))
        } else {
            Ok(TtsOutput::Batch(self.run_batch(synthesis).await?))
        }
    }

    /// Batch path regardless of the request's streaming flag.
    pub async fn synthesize(&self, mut synthesis: SynthesisRequest) -> Result<SynthesizedAudio> {
        synthesis.streaming = false;
        self.run_batch(synthesis).await
    }

    async fn run_batch(&self, synthesis: SynthesisRequest) -> Result<SynthesizedAudio> {
        let runtime = self.runtime.clone();
        let sample_rate = runtime.sample_rate();
        let request_id = synthesis.id.clone();
        let start_time = Instant::now();

        let samples = tokio::task::spawn_blocking(move || -> Result<Vec<f32>> {
            let chunks = runtime.synthesize(synthesis).map_err(runtime_failure)?;
            let mut samples = Vec::new();
            for chunk in chunks {
                samples.extend(chunk.map_err(runtime_failure)?);
            }
            Ok(samples)
        })
        .await??;

        let generation_time_ms = start_time.elapsed().as_secs_f32() * 1000.0;
        info!(
            "Generated {} samples in {:.1}ms",
            samples.len(),
            generation_time_ms
        );

        Ok(SynthesizedAudio {
            request_id,
            samples,
            sample_rate,
            generation_time_ms,
        })
    }
}

fn check_range<T>(name: &str, value: T, range: &RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            value
        )))
    }
}
