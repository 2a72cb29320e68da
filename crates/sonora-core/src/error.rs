//! Error types for the Sonora gateway

use thiserror::Error;

use crate::audio::AudioFormat;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Text is too long ({length} characters), max length is {max}")]
    TextTooLong { length: usize, max: usize },

    #[error("Streaming only supports WAV format, got {0}")]
    UnsupportedStreamingFormat(AudioFormat),

    #[error("Failed to decode audio: {0}")]
    AudioDecode(String),

    #[error(
        "Invalid token {token} at sequence {sequence}, position {position}: \
         tokens must be in 0..{codebook_size}"
    )]
    InvalidToken {
        sequence: usize,
        position: usize,
        token: i64,
        codebook_size: u32,
    },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Audio encoding error: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error was caused by the caller's request rather than the runtime.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::TextTooLong { .. }
                | Error::UnsupportedStreamingFormat(_)
                | Error::AudioDecode(_)
                | Error::InvalidToken { .. }
        )
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Inference(format!("Runtime task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_too_long_names_the_limit() {
        let err = Error::TextTooLong {
            length: 11,
            max: 10,
        };
        assert!(err.to_string().contains("max length is 10"));
        assert!(err.is_client_error());
    }

    #[test]
    fn inference_errors_are_not_client_errors() {
        assert!(!Error::Inference("boom".into()).is_client_error());
        assert!(!Error::Encoding("bad rate".into()).is_client_error());
    }
}
