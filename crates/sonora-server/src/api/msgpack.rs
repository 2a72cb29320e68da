//! MessagePack request extractor and response envelope.
//!
//! Native endpoints take their body as a single packed message. Clients that
//! send `Content-Type: application/json` are decoded as JSON instead; anything
//! else is read as MessagePack.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ApiError;

pub const MSGPACK_CONTENT_TYPE: &str = "application/msgpack";

/// Whole-message body, MessagePack on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPack<T>(pub T);

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            let mime = value.split(';').next().unwrap_or("").trim();
            mime.eq_ignore_ascii_case("application/json")
        })
        .unwrap_or(false)
}

#[async_trait]
impl<T, S> FromRequest<S> for MsgPack<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json = is_json(req.headers());
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {}", e)))?;

        let value = if json {
            serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::bad_request(format!("Malformed JSON body: {}", e)))?
        } else {
            rmp_serde::from_slice(&bytes)
                .map_err(|e| ApiError::bad_request(format!("Malformed MessagePack body: {}", e)))?
        };
        Ok(MsgPack(value))
    }
}

impl<T: Serialize> IntoResponse for MsgPack<T> {
    fn into_response(self) -> Response {
        match rmp_serde::to_vec_named(&self.0) {
            Ok(bytes) => (
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(MSGPACK_CONTENT_TYPE),
                )],
                bytes,
            )
                .into_response(),
            Err(err) => {
                ApiError::internal(format!("Failed to pack response: {}", err)).into_response()
            }
        }
    }
}
