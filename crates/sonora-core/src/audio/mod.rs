//! Audio formats and the encoders that turn generated samples into response bytes.

mod io;

pub use io::{decode_wav_bytes, pack_f16_le, unpack_f16_le, AudioClip};

use std::fmt;
use std::io::Cursor;

use mp3lame_encoder::{Builder, FlushNoGap, MonoPcm};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Output formats the native synthesis path can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    Pcm,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 3] = [AudioFormat::Wav, AudioFormat::Mp3, AudioFormat::Pcm];

    /// MIME type sent as `Content-Type`.
    pub fn content_type(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Pcm => "application/octet-stream",
        }
    }

    /// File extension used for attachment filename hints.
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Pcm => "pcm",
        }
    }

    /// Value for a `Content-Disposition` header.
    pub fn attachment_disposition(self) -> String {
        format!("attachment; filename=audio.{}", self.extension())
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Writes mono f32 samples into a container at a declared sample rate.
///
/// The declared rate is taken as-is, so writing at a rate other than the
/// generation rate changes playback speed and pitch together.
#[derive(Debug, Clone, Copy)]
pub struct AudioEncoder {
    sample_rate: u32,
}

impl AudioEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn encode(&self, samples: &[f32], format: AudioFormat) -> Result<Vec<u8>> {
        if self.sample_rate == 0 {
            return Err(Error::Encoding("sample rate must be positive".to_string()));
        }
        match format {
            AudioFormat::Wav => self.encode_wav(samples),
            AudioFormat::Pcm => Ok(pcm_i16_le(samples)),
            AudioFormat::Mp3 => self.encode_mp3(samples),
        }
    }

    /// WAV header with an empty data section, sent ahead of streamed PCM chunks.
    pub fn streaming_wav_header(&self) -> Result<Vec<u8>> {
        self.encode_wav(&[])
    }

    /// Body bytes for one streamed chunk (headerless 16-bit PCM).
    pub fn encode_stream_chunk(&self, samples: &[f32]) -> Vec<u8> {
        pcm_i16_le(samples)
    }

    fn encode_wav(&self, samples: &[f32]) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in samples {
                writer.write_sample(to_i16(sample))?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    fn encode_mp3(&self, samples: &[f32]) -> Result<Vec<u8>> {
        let mut builder =
            Builder::new().ok_or_else(|| Error::Encoding("MP3 encoder init failed".to_string()))?;
        builder
            .set_num_channels(1)
            .map_err(|e| Error::Encoding(format!("Set channels failed: {:?}", e)))?;
        builder
            .set_sample_rate(self.sample_rate)
            .map_err(|e| Error::Encoding(format!("Set sample rate failed: {:?}", e)))?;
        builder
            .set_brate(mp3lame_encoder::Bitrate::Kbps128)
            .map_err(|e| Error::Encoding(format!("Set bitrate failed: {:?}", e)))?;
        builder
            .set_quality(mp3lame_encoder::Quality::Good)
            .map_err(|e| Error::Encoding(format!("Set quality failed: {:?}", e)))?;
        let mut encoder = builder
            .build()
            .map_err(|e| Error::Encoding(format!("Build encoder failed: {:?}", e)))?;

        let pcm: Vec<i16> = samples.iter().map(|&s| to_i16(s)).collect();
        let input = MonoPcm(&pcm);

        let mut out = Vec::new();
        out.reserve(mp3lame_encoder::max_required_buffer_size(pcm.len()));
        let encoded = encoder
            .encode(input, out.spare_capacity_mut())
            .map_err(|e| Error::Encoding(format!("MP3 encoding failed: {:?}", e)))?;
        // SAFETY: the encoder initialised exactly `encoded` bytes of spare capacity.
        unsafe {
            out.set_len(out.len().wrapping_add(encoded));
        }

        out.reserve(7200);
        let flushed = encoder
            .flush::<FlushNoGap>(out.spare_capacity_mut())
            .map_err(|e| Error::Encoding(format!("MP3 flush failed: {:?}", e)))?;
        // SAFETY: as above, for the flushed tail.
        unsafe {
            out.set_len(out.len().wrapping_add(flushed));
        }

        Ok(out)
    }
}

fn to_i16(sample: f32) -> i16 {
    let clamped = if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    };
    (clamped * i16::MAX as f32) as i16
}

fn pcm_i16_le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        out.extend_from_slice(&to_i16(sample).to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_table_is_fixed() {
        assert_eq!(AudioFormat::Wav.content_type(), "audio/wav");
        assert_eq!(AudioFormat::Mp3.content_type(), "audio/mpeg");
        assert_eq!(AudioFormat::Pcm.content_type(), "application/octet-stream");
        assert_eq!(
            AudioFormat::Mp3.attachment_disposition(),
            "attachment; filename=audio.mp3"
        );
    }

    #[test]
    fn wav_declares_requested_rate() {
        let encoder = AudioEncoder::new(88_200);
        let bytes = encoder.encode(&[0.0, 0.5, -0.5], AudioFormat::Wav).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 88_200);
        assert_eq!(reader.len(), 3);
    }

    #[test]
    fn streaming_header_is_empty_wav() {
        let header = AudioEncoder::new(44_100).streaming_wav_header().unwrap();
        assert_eq!(header.len(), 44);
        assert_eq!(&header[0..4], b"RIFF");
    }

    #[test]
    fn pcm_is_headerless_i16() {
        let bytes = AudioEncoder::new(24_000)
            .encode(&[1.0, -1.0], AudioFormat::Pcm)
            .unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
    }

    #[test]
    fn zero_rate_is_an_encoding_error() {
        let err = AudioEncoder::new(0).encode(&[0.0], AudioFormat::Wav).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }
}
