//! Audio container parsing and sample packing.

use std::io::Cursor;

use half::f16;
use tracing::debug;

use crate::error::{Error, Result};

/// Mono PCM samples at a known rate, as handed to the model runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

/// Parse a WAV container into mono f32 samples in `[-1, 1]`.
pub fn decode_wav_bytes(wav_bytes: &[u8]) -> Result<AudioClip> {
    if wav_bytes.is_empty() {
        return Err(Error::AudioDecode("empty audio buffer".to_string()));
    }

    let mut reader = hound::WavReader::new(Cursor::new(wav_bytes))
        .map_err(|e| Error::AudioDecode(format!("Failed to parse WAV: {}", e)))?;

    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(Error::AudioDecode("WAV declares a zero sample rate".to_string()));
    }
    let channels = spec.channels.max(1) as usize;

    let mut samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample.max(1) as u32;
            let max_val = if bits > 1 {
                ((1i64 << (bits - 1)) - 1) as f32
            } else {
                1.0
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| (s as f32 / max_val).clamp(-1.0, 1.0)))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::AudioDecode(format!("Corrupt WAV samples: {}", e)))?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::AudioDecode(format!("Corrupt WAV samples: {}", e)))?,
    };

    if channels > 1 {
        let mut mono = Vec::with_capacity(samples.len() / channels + 1);
        for frame in samples.chunks(channels) {
            let sum: f32 = frame.iter().copied().sum();
            mono.push(sum / frame.len() as f32);
        }
        debug!("Downmixed {} channels to mono", channels);
        samples = mono;
    }

    for sample in &mut samples {
        if !sample.is_finite() {
            *sample = 0.0;
        } else {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    Ok(AudioClip::new(samples, spec.sample_rate))
}

/// Little-endian half-precision packing used by the decode endpoint.
pub fn pack_f16_le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        out.extend_from_slice(&f16::from_f32(sample).to_le_bytes());
    }
    out
}

pub fn unpack_f16_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| f16::from_le_bytes([pair[0], pair[1]]).to_f32())
        .collect()
}
