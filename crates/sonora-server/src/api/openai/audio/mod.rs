//! OpenAI-compatible audio resources.

pub mod speech;

use axum::{routing::post, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/audio/speech", post(speech::speech))
}
