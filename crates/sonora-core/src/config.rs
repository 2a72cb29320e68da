//! Configuration types for the Sonora gateway

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Request limits and shared-resource settings, read once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Maximum characters accepted by `/v1/tts` (0 = unlimited)
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    /// Maximum candidate generations the runtime may produce per synthesis call
    #[serde(default = "default_max_num_samples")]
    pub max_num_samples: usize,

    /// Entries kept in the content-addressed encode cache (0 disables it)
    #[serde(default = "default_encode_cache_capacity")]
    pub encode_cache_capacity: usize,

    /// Requests allowed to hold the model runtime at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_text_length: default_max_text_length(),
            max_num_samples: default_max_num_samples(),
            encode_cache_capacity: default_encode_cache_capacity(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl GatewayConfig {
    /// Reject settings the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_num_samples == 0 {
            return Err(Error::Config("max_num_samples must be at least 1".to_string()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(Error::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_max_text_length(mut self, max_text_length: usize) -> Self {
        self.max_text_length = max_text_length;
        self
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {}='{}', using default", key, raw);
            None
        }
    }
}

fn default_max_text_length() -> usize {
    env_usize("MAX_TEXT_LENGTH").unwrap_or(0)
}

fn default_max_num_samples() -> usize {
    env_usize("NUM_SAMPLES").unwrap_or(1)
}

fn default_encode_cache_capacity() -> usize {
    1024
}

fn default_max_concurrent_requests() -> usize {
    env_usize("MAX_CONCURRENT_REQUESTS").unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_samples_is_rejected() {
        let config = GatewayConfig {
            max_num_samples: 0,
            ..GatewayConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: GatewayConfig = serde_json::from_str(r#"{"max_text_length": 10}"#).unwrap();
        assert_eq!(config.max_text_length, 10);
        assert_eq!(config.encode_cache_capacity, 1024);
        assert!(config.validate().is_ok());
    }
}
