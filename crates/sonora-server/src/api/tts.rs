//! Native synthesis endpoint.
//!
//! Streaming responses send a WAV header with an open-ended data section and
//! then raw 16-bit PCM per generated chunk. Once the header has gone out a
//! generation failure can only abort the body, so clients must treat a
//! truncated stream as a failed request.

use std::io;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::HeaderMap,
    response::Response,
    routing::post,
    Router,
};
use futures::StreamExt;
use sonora_core::{AudioEncoder, TtsOutput, TtsRequest};
use tracing::{error, info};

use crate::api::msgpack::MsgPack;
use crate::api::response::{audio_response, generation_stats_headers, one_shot};
use crate::api::AUDIO_BODY_LIMIT_BYTES;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/tts",
        post(tts).layer(DefaultBodyLimit::max(AUDIO_BODY_LIMIT_BYTES)),
    )
}

pub async fn tts(
    State(state): State<AppState>,
    MsgPack(req): MsgPack<TtsRequest>,
) -> Result<Response, ApiError> {
    let format = req.format;
    let synthesis = state.tts.validate(&req)?;
    let permit = state.acquire_permit().await?;

    match state.tts.dispatch(synthesis).await? {
        TtsOutput::Stream(mut stream) => {
            let encoder = AudioEncoder::new(stream.sample_rate());
            let header = encoder.streaming_wav_header()?;
            let request_id = stream.request_id().to_string();

            let body = async_stream::stream! {
                let _permit = permit;
                yield Ok::<_, io::Error>(Bytes::from(header));

                let mut chunks = 0usize;
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(chunk) => {
                            chunks += 1;
                            yield Ok(Bytes::from(encoder.encode_stream_chunk(&chunk.samples)));
                        }
                        Err(err) => {
                            error!("Aborting stream {} after {} chunks: {}", request_id, chunks, err);
                            yield Err(io::Error::new(io::ErrorKind::Other, err.to_string()));
                            break;
                        }
                    }
                }
                info!("Stream {} finished: {} chunks", request_id, chunks);
            };

            Ok(audio_response(format, true, HeaderMap::new(), body))
        }
        TtsOutput::Batch(audio) => {
            drop(permit);

            let headers = generation_stats_headers(&audio);
            let encoder = AudioEncoder::new(audio.sample_rate);
            let bytes = tokio::task::spawn_blocking(move || encoder.encode(&audio.samples, format))
                .await
                .map_err(|e| ApiError::internal(format!("Audio encoding failed: {}", e)))??;

            Ok(audio_response(format, true, headers, one_shot(bytes)))
        }
    }
}
