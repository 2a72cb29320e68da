//! Model runtime seam.
//!
//! The gateway never owns model weights. Everything it needs from the model is
//! expressed by [`SpeechRuntime`], and a handle to it is passed in explicitly
//! so request handling can be exercised against fakes.

mod synthetic;

pub use synthetic::SyntheticRuntime;

use std::sync::Arc;

use crate::audio::AudioClip;
use crate::error::Result;

/// Lazily produced audio chunks of one synthesis call, in generation order.
pub type ChunkIter = Box<dyn Iterator<Item = Result<Vec<f32>>> + Send>;

/// Shared, long-lived runtime handle.
pub type RuntimeHandle = Arc<dyn SpeechRuntime>;

/// Voice-cloning reference handed to the runtime after validation.
#[derive(Debug, Clone)]
pub struct ReferenceClip {
    pub audio: AudioClip,
    pub text: String,
}

/// Fully validated synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub id: String,
    pub text: String,
    pub references: Vec<ReferenceClip>,
    pub reference_id: Option<String>,
    pub seed: Option<u64>,
    pub use_memory_cache: bool,
    pub normalize: bool,
    pub chunk_length: usize,
    /// `0` lets the runtime use its own maximum.
    pub max_new_tokens: usize,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub temperature: f32,
    /// Upper bound on candidate generations; chunks of the first candidate are returned.
    pub num_samples: usize,
    pub streaming: bool,
}

/// Blocking model operations. Implementations serialize or batch access internally;
/// callers invoke them from blocking threads.
pub trait SpeechRuntime: Send + Sync {
    /// Rate of every sample this runtime produces.
    fn sample_rate(&self) -> u32;

    /// Number of entries in the discrete audio vocabulary.
    fn codebook_size(&self) -> u32;

    /// Encode clips into token sequences, one per clip, in order.
    fn encode_batch(&self, clips: &[AudioClip]) -> Result<Vec<Vec<u32>>>;

    /// Decode token sequences into mono samples, one buffer per sequence, in order.
    fn decode_batch(&self, tokens: &[Vec<u32>]) -> Result<Vec<Vec<f32>>>;

    /// Start a generation. Chunks are produced only as the iterator is advanced,
    /// so dropping it stops the model at the next chunk boundary.
    fn synthesize(&self, request: SynthesisRequest) -> Result<ChunkIter>;
}

/// Normalise an error raised by the runtime: caller mistakes keep their meaning,
/// everything else becomes an inference failure.
pub(crate) fn runtime_failure(err: crate::error::Error) -> crate::error::Error {
    use crate::error::Error;

    match err {
        err if err.is_client_error() => err,
        Error::Inference(_) => err,
        other => Error::Inference(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::error::Error;

    /// Synthetic runtime that counts calls and can fail after a number of chunks.
    pub struct CountingRuntime {
        pub inner: SyntheticRuntime,
        pub encode_calls: AtomicUsize,
        pub decode_calls: AtomicUsize,
        pub encoded_clips: AtomicUsize,
        pub chunks_produced: Arc<AtomicUsize>,
        pub fail_after_chunks: Option<usize>,
        pub total_chunks: usize,
    }

    impl CountingRuntime {
        pub fn new() -> Self {
            Self {
                inner: SyntheticRuntime::new(44_100),
                encode_calls: AtomicUsize::new(0),
                decode_calls: AtomicUsize::new(0),
                encoded_clips: AtomicUsize::new(0),
                chunks_produced: Arc::new(AtomicUsize::new(0)),
                fail_after_chunks: None,
                total_chunks: 4,
            }
        }

        pub fn failing_after(chunks: usize) -> Self {
            Self {
                fail_after_chunks: Some(chunks),
                ..Self::new()
            }
        }

        pub fn endless() -> Self {
            Self {
                total_chunks: usize::MAX,
                ..Self::new()
            }
        }
    }

    impl SpeechRuntime for CountingRuntime {
        fn sample_rate(&self) -> u32 {
            self.inner.sample_rate()
        }

        fn codebook_size(&self) -> u32 {
            self.inner.codebook_size()
        }

        fn encode_batch(&self, clips: &[AudioClip]) -> Result<Vec<Vec<u32>>> {
            self.encode_calls.fetch_add(1, Ordering::SeqCst);
            self.encoded_clips.fetch_add(clips.len(), Ordering::SeqCst);
            self.inner.encode_batch(clips)
        }

        fn decode_batch(&self, tokens: &[Vec<u32>]) -> Result<Vec<Vec<f32>>> {
            self.decode_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.decode_batch(tokens)
        }

        fn synthesize(&self, _request: SynthesisRequest) -> Result<ChunkIter> {
            let produced = self.chunks_produced.clone();
            let fail_after = self.fail_after_chunks;
            let total = self.total_chunks;
            let mut index = 0usize;
            Ok(Box::new(std::iter::from_fn(move || {
                if index >= total {
                    return None;
                }
                if fail_after == Some(index) {
                    index = total;
                    return Some(Err(Error::Inference("decoder diverged".to_string())));
                }
                produced.fetch_add(1, Ordering::SeqCst);
                let value = index as f32 / 10.0;
                index += 1;
                Some(Ok(vec![value; 8]))
            })))
        }
    }
}
