//! OpenAI-compatible speech synthesis endpoint.
//!
//! The request is translated onto the native shape and always runs on the
//! batch path; the encoded file is then returned as a single-chunk stream.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};
use sonora_core::{adapt_request, output_sample_rate, AudioEncoder, OpenAiSpeechRequest};
use tracing::{debug, info};

use crate::api::response::{audio_response, generation_stats_headers, one_shot};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn speech(
    State(state): State<AppState>,
    payload: Result<Json<OpenAiSpeechRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    info!("OpenAI speech request: {} chars", req.input.chars().count());

    req.validate()?;
    let native = adapt_request(&req);
    let format = native.format;
    debug!(
        "Resolved response_format '{}' to {}, ignoring voice '{}' and model '{}'",
        req.response_format, format, req.voice, req.model
    );

    let synthesis = state.tts.validate(&native)?;

    let audio = {
        let _permit = state.acquire_permit().await?;
        state.tts.synthesize(synthesis).await?
    };

    let sample_rate = output_sample_rate(audio.sample_rate, req.speed);
    if sample_rate != audio.sample_rate {
        debug!(
            "Applying speed {} by writing at {} Hz instead of {} Hz",
            req.speed, sample_rate, audio.sample_rate
        );
    }

    let headers = generation_stats_headers(&audio);
    let encoder = AudioEncoder::new(sample_rate);
    let bytes = tokio::task::spawn_blocking(move || encoder.encode(&audio.samples, format))
        .await
        .map_err(|e| ApiError::internal(format!("Audio encoding failed: {}", e)))??;

    Ok(audio_response(format, false, headers, one_shot(bytes)))
}
