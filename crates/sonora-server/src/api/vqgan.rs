//! Codec endpoints: audio to tokens and back, MessagePack in and out.

use axum::{extract::DefaultBodyLimit, extract::State, routing::post, Router};
use sonora_core::schema::{
    ByteBuf, DecodeRequest, DecodeResponse, EncodeRequest, EncodeResponse,
};
use tracing::info;

use crate::api::msgpack::MsgPack;
use crate::api::AUDIO_BODY_LIMIT_BYTES;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/vqgan/encode",
            post(encode).layer(DefaultBodyLimit::max(AUDIO_BODY_LIMIT_BYTES)),
        )
        .route(
            "/vqgan/decode",
            post(decode).layer(DefaultBodyLimit::max(AUDIO_BODY_LIMIT_BYTES)),
        )
}

pub async fn encode(
    State(state): State<AppState>,
    MsgPack(req): MsgPack<EncodeRequest>,
) -> Result<MsgPack<EncodeResponse>, ApiError> {
    info!("VQGAN encode request: {} audios", req.audios.len());

    let _permit = state.acquire_permit().await?;
    let audios = req.audios.into_iter().map(ByteBuf::into_vec).collect();
    let tokens = state.codec.encode(audios).await?;

    Ok(MsgPack(EncodeResponse { tokens }))
}

pub async fn decode(
    State(state): State<AppState>,
    MsgPack(req): MsgPack<DecodeRequest>,
) -> Result<MsgPack<DecodeResponse>, ApiError> {
    info!("VQGAN decode request: {} token sequences", req.tokens.len());

    let _permit = state.acquire_permit().await?;
    let audios = state.codec.decode(req.tokens).await?;

    Ok(MsgPack(DecodeResponse {
        audios: audios.into_iter().map(ByteBuf::from).collect(),
    }))
}
