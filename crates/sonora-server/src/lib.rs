//! Sonora Server - HTTP API for audio codec and text-to-speech inference

pub mod api;
pub mod error;
pub mod state;

pub use api::create_router;
pub use error::ApiError;
pub use state::AppState;
