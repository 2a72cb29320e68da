//! OpenAI-compatible API namespace.

pub mod audio;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().merge(audio::router())
}
