//! Streaming state of the synthesis pipeline.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::runtime::{runtime_failure, RuntimeHandle, SynthesisRequest};

/// A chunk of generated audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Position in generation order, starting at 0
    pub sequence: usize,
    /// Mono samples at the runtime sample rate
    pub samples: Vec<f32>,
}

/// Lazy, finite, single-pass sequence of generated chunks.
///
/// Generation runs on a blocking thread that hands chunks over a channel with
/// room for one item. Before producing each chunk the producer checks whether
/// this stream is still alive; dropping it stops the model at the next chunk
/// boundary. A generation error ends the stream with that error, after any
/// chunks already yielded.
///
/// The producer may run ahead of the consumer by up to three chunks: one held
/// in `first`, one buffered in the channel and one waiting in `blocking_send`.
/// That bounds how much audio is generated after a client disconnects.
pub struct AudioStream {
    request_id: String,
    sample_rate: u32,
    first: Option<Result<AudioChunk>>,
    rest: ReceiverStream<Result<AudioChunk>>,
}

impl AudioStream {
    /// Start generation and wait for its first outcome, so that a runtime
    /// failing up front is reported before anything is sent.
    pub(crate) async fn start(
        runtime: RuntimeHandle,
        synthesis: SynthesisRequest,
    ) -> Result<Self> {
        let request_id = synthesis.id.clone();
        let sample_rate = runtime.sample_rate();
        let (tx, mut rx) = mpsc::channel::<Result<AudioChunk>>(1);

        tokio::task::spawn_blocking(move || produce(runtime, synthesis, tx));

        let first = match rx.recv().await {
            Some(Err(err)) => return Err(err),
            other => other,
        };

        Ok(Self {
            request_id,
            sample_rate,
            first,
            rest: ReceiverStream::new(rx),
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Stream for AudioStream {
    type Item = Result<AudioChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(first) = self.first.take() {
            return Poll::Ready(Some(first));
        }
        Pin::new(&mut self.rest).poll_next(cx)
    }
}

fn produce(
    runtime: RuntimeHandle,
    synthesis: SynthesisRequest,
    tx: mpsc::Sender<Result<AudioChunk>>,
) {
    let request_id = synthesis.id.clone();
    let mut chunks = match runtime.synthesize(synthesis) {
        Ok(chunks) => chunks,
        Err(err) => {
            error!("Streaming generation {} failed to start: {}", request_id, err);
            let _ = tx.blocking_send(Err(runtime_failure(err)));
            return;
        }
    };

    let mut sequence = 0usize;
    loop {
        if tx.is_closed() {
            info!(
                "Client went away, stopping generation {} after {} chunks",
                request_id, sequence
            );
            return;
        }

        match chunks.next() {
            None => break,
            Some(Ok(samples)) => {
                if samples.is_empty() {
                    continue;
                }
                let chunk = AudioChunk { sequence, samples };
                if tx.blocking_send(Ok(chunk)).is_err() {
                    warn!("Streaming channel closed for {}", request_id);
                    return;
                }
                sequence += 1;
            }
            Some(Err(err)) => {
                error!(
                    "Streaming generation {} failed after {} chunks: {}",
                    request_id, sequence, err
                );
                let _ = tx.blocking_send(Err(runtime_failure(err)));
                return;
            }
        }
    }

    debug!(
        "Streaming generation {} complete: {} chunks",
        request_id, sequence
    );
}
