//! Deterministic stand-in for the generative model.
//!
//! Encodes each hop-sized frame as its quantized RMS level and decodes a token
//! back into a hop of sine tone at that level. Synthesis renders one tone burst
//! per character. Output is reproducible for a given request and seed, which
//! makes it suitable for development servers and tests; it is not speech.

use std::collections::VecDeque;
use std::f32::consts::TAU;

use tracing::debug;

use super::{ChunkIter, SpeechRuntime, SynthesisRequest};
use crate::audio::AudioClip;
use crate::error::{Error, Result};

const HOP_LENGTH: usize = 512;
const CODEBOOK_SIZE: u32 = 1024;
const CARRIER_HZ: f32 = 220.0;
const SECS_PER_CHAR: f32 = 0.06;

#[derive(Debug, Clone)]
pub struct SyntheticRuntime {
    sample_rate: u32,
}

impl SyntheticRuntime {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    fn encode_clip(&self, clip: &AudioClip) -> Result<Vec<u32>> {
        if clip.sample_rate == 0 {
            return Err(Error::AudioDecode("clip has a zero sample rate".to_string()));
        }
        // Frame count at the runtime's own rate; windows are mapped back onto the
        // source so clips at other rates keep their duration.
        let target_len =
            (clip.samples.len() as u64 * self.sample_rate as u64 / clip.sample_rate as u64) as usize;
        let frames = target_len.div_ceil(HOP_LENGTH);
        let ratio = clip.sample_rate as f64 / self.sample_rate as f64;

        let mut tokens = Vec::with_capacity(frames);
        for frame in 0..frames {
            let start = ((frame * HOP_LENGTH) as f64 * ratio) as usize;
            let end = ((((frame + 1) * HOP_LENGTH) as f64 * ratio) as usize)
                .min(clip.samples.len())
                .max(start);
            let window = &clip.samples[start.min(clip.samples.len())..end];
            let rms = if window.is_empty() {
                0.0
            } else {
                (window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32).sqrt()
            };
            let level = (rms.clamp(0.0, 1.0) * (CODEBOOK_SIZE - 1) as f32).round() as u32;
            tokens.push(level);
        }
        Ok(tokens)
    }

    fn decode_tokens(&self, tokens: &[u32]) -> Vec<f32> {
        let mut samples = Vec::with_capacity(tokens.len() * HOP_LENGTH);
        let step = TAU * CARRIER_HZ / self.sample_rate as f32;
        for (frame, &token) in tokens.iter().enumerate() {
            let amplitude = token as f32 / (CODEBOOK_SIZE - 1) as f32 * std::f32::consts::SQRT_2;
            for i in 0..HOP_LENGTH {
                let n = (frame * HOP_LENGTH + i) as f32;
                samples.push((amplitude * (step * n).sin()).clamp(-1.0, 1.0));
            }
        }
        samples
    }
}

impl Default for SyntheticRuntime {
    fn default() -> Self {
        Self::new(44_100)
    }
}

impl SpeechRuntime for SyntheticRuntime {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn codebook_size(&self) -> u32 {
        CODEBOOK_SIZE
    }

    fn encode_batch(&self, clips: &[AudioClip]) -> Result<Vec<Vec<u32>>> {
        clips.iter().map(|clip| self.encode_clip(clip)).collect()
    }

    fn decode_batch(&self, tokens: &[Vec<u32>]) -> Result<Vec<Vec<f32>>> {
        if let Some(bad) = tokens.iter().flatten().find(|&&t| t >= CODEBOOK_SIZE) {
            return Err(Error::Inference(format!("token {} outside codebook", bad)));
        }
        Ok(tokens.iter().map(|seq| self.decode_tokens(seq)).collect())
    }

    fn synthesize(&self, request: SynthesisRequest) -> Result<ChunkIter> {
        let text = if request.normalize {
            request.text.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            request.text.clone()
        };

        let mut segments = VecDeque::new();
        let mut current = String::new();
        for word in text.split(' ').filter(|w| !w.is_empty()) {
            if !current.is_empty() && current.chars().count() + word.chars().count() >= request.chunk_length {
                segments.push_back(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            segments.push_back(current);
        }

        let max_samples = match request.max_new_tokens {
            0 => usize::MAX,
            n => n.saturating_mul(HOP_LENGTH),
        };

        debug!(
            "Synthetic synthesis {}: {} segments, seed {:?}",
            request.id,
            segments.len(),
            request.seed
        );

        Ok(Box::new(ToneChunks {
            segments,
            sample_rate: self.sample_rate,
            seed_offset: request.seed.map(|s| (s % 97) as f32).unwrap_or(0.0),
            remaining: max_samples,
            phase: 0,
        }))
    }
}

/// One tone burst per character, emitted segment by segment.
struct ToneChunks {
    segments: VecDeque<String>,
    sample_rate: u32,
    seed_offset: f32,
    remaining: usize,
    phase: usize,
}

impl Iterator for ToneChunks {
    type Item = Result<Vec<f32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let segment = self.segments.pop_front()?;
        let per_char = (self.sample_rate as f32 * SECS_PER_CHAR) as usize;

        let mut samples = Vec::with_capacity(segment.chars().count() * per_char);
        for ch in segment.chars() {
            let freq = 180.0 + self.seed_offset + (ch as u32 % 64) as f32 * 8.0;
            let step = TAU * freq / self.sample_rate as f32;
            for i in 0..per_char {
                let envelope = (i as f32 / per_char as f32 * std::f32::consts::PI).sin();
                samples.push(0.3 * envelope * (step * (self.phase + i) as f32).sin());
            }
            self.phase += per_char;
        }

        samples.truncate(self.remaining);
        self.remaining -= samples.len();
        Some(Ok(samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> SynthesisRequest {
        SynthesisRequest {
            id: "test".to_string(),
            text: text.to_string(),
            references: Vec::new(),
            reference_id: None,
            seed: Some(7),
            use_memory_cache: false,
            normalize: true,
            chunk_length: 100,
            max_new_tokens: 0,
            top_p: 0.8,
            repetition_penalty: 1.1,
            temperature: 0.8,
            num_samples: 1,
            streaming: false,
        }
    }

    #[test]
    fn encode_produces_one_token_per_hop() {
        let runtime = SyntheticRuntime::new(44_100);
        let clip = AudioClip::new(vec![0.25; HOP_LENGTH * 3 + 1], 44_100);
        let tokens = runtime.encode_batch(&[clip]).unwrap();
        assert_eq!(tokens[0].len(), 4);
        assert!(tokens[0][0] > 0);
    }

    #[test]
    fn decode_keeps_clip_duration_across_rates() {
        let runtime = SyntheticRuntime::new(44_100);
        let clip = AudioClip::new(vec![0.1; 22_050], 22_050);
        let tokens = runtime.encode_batch(&[clip]).unwrap();
        let audio = runtime.decode_batch(&tokens).unwrap();
        let secs = audio[0].len() as f32 / 44_100.0;
        assert!((secs - 1.0).abs() < HOP_LENGTH as f32 / 44_100.0 + 1e-3);
    }

    #[test]
    fn synthesis_is_deterministic() {
        let runtime = SyntheticRuntime::default();
        let a: Vec<_> = runtime
            .synthesize(request("hello there"))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let b: Vec<_> = runtime
            .synthesize(request("hello there"))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn max_new_tokens_caps_output() {
        let runtime = SyntheticRuntime::default();
        let mut req = request("a fairly long sentence to render");
        req.max_new_tokens = 2;
        let total: usize = runtime
            .synthesize(req)
            .unwrap()
            .map(|chunk| chunk.unwrap().len())
            .sum();
        assert_eq!(total, 2 * HOP_LENGTH);
    }
}
