//! Application state shared by all handlers

use std::sync::Arc;

use sonora_core::{CodecGateway, GatewayConfig, RuntimeHandle, TtsPipeline};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ApiError;

/// Cheap-to-clone handles to the gateway components and the runtime they share.
#[derive(Clone)]
pub struct AppState {
    pub codec: Arc<CodecGateway>,
    pub tts: Arc<TtsPipeline>,
    pub config: Arc<GatewayConfig>,
    /// Bounds the number of requests holding the model runtime at once
    pub request_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(runtime: RuntimeHandle, config: GatewayConfig) -> Self {
        let codec = CodecGateway::new(runtime.clone(), config.encode_cache_capacity);
        let tts = TtsPipeline::new(runtime, &config);

        Self {
            codec: Arc::new(codec),
            tts: Arc::new(tts),
            request_semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            config: Arc::new(config),
        }
    }

    /// Acquire a permit for model work. Owned so that streaming bodies can hold
    /// it until the last chunk is sent.
    pub async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, ApiError> {
        self.request_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::service_unavailable("Server is shutting down"))
    }
}
