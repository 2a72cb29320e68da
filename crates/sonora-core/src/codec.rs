//! Codec gateway: raw audio to token sequences and back.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::audio::{decode_wav_bytes, pack_f16_le};
use crate::error::{Error, Result};
use crate::runtime::{runtime_failure, RuntimeHandle, SpeechRuntime};

type CacheKey = [u8; 32];

/// Validates codec requests and dispatches them to the runtime as whole batches.
pub struct CodecGateway {
    runtime: RuntimeHandle,
    cache: Arc<EncodeCache>,
}

impl CodecGateway {
    pub fn new(runtime: RuntimeHandle, cache_capacity: usize) -> Self {
        Self {
            runtime,
            cache: Arc::new(EncodeCache::new(cache_capacity)),
        }
    }

    /// Encode every buffer, or fail without returning any tokens.
    pub async fn encode(&self, audios: Vec<Vec<u8>>) -> Result<Vec<Vec<u32>>> {
        if audios.is_empty() {
            return Ok(Vec::new());
        }

        let runtime = self.runtime.clone();
        let cache = self.cache.clone();
        let start_time = Instant::now();

        let tokens =
            tokio::task::spawn_blocking(move || encode_cached(runtime.as_ref(), &cache, &audios))
                .await??;

        info!(
            "[EXEC] VQGAN encode time: {:.2}ms",
            start_time.elapsed().as_secs_f64() * 1000.0
        );
        Ok(tokens)
    }

    /// Decode all sequences in a single runtime call into little-endian f16 buffers.
    pub async fn decode(&self, tokens: Vec<Vec<i64>>) -> Result<Vec<Vec<u8>>> {
        let sequences = validate_tokens(&tokens, self.runtime.codebook_size())?;
        if sequences.is_empty() {
            return Ok(Vec::new());
        }

        let runtime = self.runtime.clone();
        let start_time = Instant::now();
        let expected = sequences.len();

        let audios = tokio::task::spawn_blocking(move || runtime.decode_batch(&sequences))
            .await?
            .map_err(runtime_failure)?;

        info!(
            "[EXEC] VQGAN decode time: {:.2}ms",
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        if audios.len() != expected {
            return Err(Error::Inference(format!(
                "runtime decoded {} buffers for {} token sequences",
                audios.len(),
                expected
            )));
        }
        Ok(audios.iter().map(|samples| pack_f16_le(samples)).collect())
    }
}

fn validate_tokens(tokens: &[Vec<i64>], codebook_size: u32) -> Result<Vec<Vec<u32>>> {
    tokens
        .iter()
        .enumerate()
        .map(|(sequence, seq)| {
            seq.iter()
                .enumerate()
                .map(|(position, &token)| {
                    if token < 0 || token >= codebook_size as i64 {
                        Err(Error::InvalidToken {
                            sequence,
                            position,
                            token,
                            codebook_size,
                        })
                    } else {
                        Ok(token as u32)
                    }
                })
                .collect()
        })
        .collect()
}

fn content_key(bytes: &[u8]) -> CacheKey {
    Sha256::digest(bytes).into()
}

fn encode_cached(
    runtime: &dyn SpeechRuntime,
    cache: &EncodeCache,
    audios: &[Vec<u8>],
) -> Result<Vec<Vec<u32>>> {
    let keys: Vec<CacheKey> = audios.iter().map(|audio| content_key(audio)).collect();
    let mut results = cache.lookup(&keys);

    // Parse every miss before touching the model; identical buffers are encoded once.
    let mut clips = Vec::new();
    let mut miss_keys = Vec::new();
    let mut slot_of: HashMap<CacheKey, usize> = HashMap::new();
    for (index, key) in keys.iter().enumerate() {
        if results[index].is_some() || slot_of.contains_key(key) {
            continue;
        }
        let clip = decode_wav_bytes(&audios[index]).map_err(|err| match err {
            Error::AudioDecode(msg) => Error::AudioDecode(format!("audio #{}: {}", index, msg)),
            other => other,
        })?;
        slot_of.insert(*key, clips.len());
        miss_keys.push(*key);
        clips.push(clip);
    }

    debug!(
        "Encode batch: {} inputs, {} cache hits, {} to encode",
        audios.len(),
        audios.len() - results.iter().filter(|r| r.is_none()).count(),
        clips.len()
    );

    if !clips.is_empty() {
        let encoded = runtime.encode_batch(&clips).map_err(runtime_failure)?;
        if encoded.len() != clips.len() {
            return Err(Error::Inference(format!(
                "runtime encoded {} sequences for {} clips",
                encoded.len(),
                clips.len()
            )));
        }

        for (index, key) in keys.iter().enumerate() {
            if results[index].is_none() {
                if let Some(&slot) = slot_of.get(key) {
                    results[index] = Some(encoded[slot].clone());
                }
            }
        }
        cache.insert(miss_keys.into_iter().zip(encoded));
    }

    results
        .into_iter()
        .map(|tokens| tokens.ok_or_else(|| Error::Inference("missing encode result".to_string())))
        .collect()
}

/// Bounded content-addressed store of encode results, evicted oldest-first.
struct EncodeCache {
    capacity: usize,
    inner: RwLock<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, Vec<u32>>,
    order: VecDeque<CacheKey>,
}

impl EncodeCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    fn lookup(&self, keys: &[CacheKey]) -> Vec<Option<Vec<u32>>> {
        if self.capacity == 0 {
            return vec![None; keys.len()];
        }
        let inner = self.inner.blocking_read();
        keys.iter().map(|key| inner.entries.get(key).cloned()).collect()
    }

    fn insert(&self, items: impl IntoIterator<Item = (CacheKey, Vec<u32>)>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.blocking_write();
        for (key, tokens) in items {
            if inner.entries.insert(key, tokens).is_none() {
                inner.order.push_back(key);
            }
            while inner.order.len() > self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::audio::unpack_f16_le;
    use crate::runtime::fakes::CountingRuntime;

    fn wav(samples: usize, sample_rate: u32, level: f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..samples {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                writer
                    .write_sample((sign * level * i16::MAX as f32) as i16)
                    .unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn gateway(capacity: usize) -> (Arc<CountingRuntime>, CodecGateway) {
        let runtime = Arc::new(CountingRuntime::new());
        let gateway = CodecGateway::new(runtime.clone(), capacity);
        (runtime, gateway)
    }

    #[tokio::test]
    async fn empty_encode_is_not_an_error() {
        let (runtime, gateway) = gateway(16);
        assert!(gateway.encode(Vec::new()).await.unwrap().is_empty());
        assert_eq!(runtime.encode_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn encode_preserves_length_and_order() {
        let (_, gateway) = gateway(16);
        let quiet = wav(2048, 44_100, 0.1);
        let loud = wav(1024, 44_100, 0.8);
        let tokens = gateway.encode(vec![quiet, loud]).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].len(), 4);
        assert_eq!(tokens[1].len(), 2);
        assert!(tokens[1][0] > tokens[0][0]);
    }

    #[tokio::test]
    async fn repeated_audio_hits_the_cache() {
        let (runtime, gateway) = gateway(16);
        let audio = wav(1024, 44_100, 0.5);
        let first = gateway.encode(vec![audio.clone(), audio.clone()]).await.unwrap();
        assert_eq!(runtime.encoded_clips.load(Ordering::SeqCst), 1);
        assert_eq!(first[0], first[1]);

        let second = gateway.encode(vec![audio]).await.unwrap();
        assert_eq!(second[0], first[0]);
        assert_eq!(runtime.encode_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_capacity_disables_caching() {
        let (runtime, gateway) = gateway(0);
        let audio = wav(512, 44_100, 0.5);
        gateway.encode(vec![audio.clone()]).await.unwrap();
        gateway.encode(vec![audio]).await.unwrap();
        assert_eq!(runtime.encode_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_bad_buffer_fails_the_whole_call() {
        let (runtime, gateway) = gateway(16);
        let err = gateway
            .encode(vec![wav(512, 44_100, 0.5), b"garbage".to_vec()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AudioDecode(ref msg) if msg.contains("#1")));
        assert_eq!(runtime.encode_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn decode_is_one_batch_call() {
        let (runtime, gateway) = gateway(16);
        let audios = gateway
            .decode(vec![vec![1, 2, 3], vec![], vec![1023]])
            .await
            .unwrap();
        assert_eq!(audios.len(), 3);
        assert_eq!(runtime.decode_calls.load(Ordering::SeqCst), 1);
        assert_eq!(unpack_f16_le(&audios[0]).len(), 3 * 512);
        assert!(audios[1].is_empty());
    }

    #[tokio::test]
    async fn out_of_range_tokens_are_rejected_before_dispatch() {
        let (runtime, gateway) = gateway(16);
        for bad in [-1i64, 1024] {
            let err = gateway.decode(vec![vec![0, bad]]).await.unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidToken {
                    sequence: 0,
                    position: 1,
                    ..
                }
            ));
        }
        assert_eq!(runtime.decode_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn round_trip_keeps_duration() {
        let (_, gateway) = gateway(16);
        let tokens = gateway.encode(vec![wav(44_100, 44_100, 0.3)]).await.unwrap();
        let wire: Vec<Vec<i64>> = tokens
            .iter()
            .map(|seq| seq.iter().map(|&t| t as i64).collect())
            .collect();
        let audios = gateway.decode(wire).await.unwrap();
        let samples = unpack_f16_le(&audios[0]);
        let drift = samples.len() as i64 - 44_100;
        assert!((0..512).contains(&drift), "drift {}", drift);
    }

    #[test]
    fn cache_evicts_oldest_first() {
        let cache = EncodeCache::new(2);
        cache.insert([([1; 32], vec![1]), ([2; 32], vec![2]), ([3; 32], vec![3])]);
        let found = cache.lookup(&[[1; 32], [2; 32], [3; 32]]);
        assert_eq!(found, vec![None, Some(vec![2]), Some(vec![3])]);
    }
}
