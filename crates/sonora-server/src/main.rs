//! Sonora Server - HTTP gateway for audio codec and TTS inference

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sonora_core::{GatewayConfig, RuntimeHandle, SyntheticRuntime};
use sonora_server::{create_router, AppState};

/// Sonora audio codec and text-to-speech gateway
#[derive(Debug, Parser)]
#[command(name = "sonora-server", version, about, long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "SONORA_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "SONORA_PORT")]
    port: u16,

    /// Maximum characters accepted by /v1/tts (0 = unlimited)
    #[arg(long, default_value_t = 0, env = "MAX_TEXT_LENGTH")]
    max_text_length: usize,

    /// Maximum candidate generations per synthesis call
    #[arg(long, default_value_t = 1, env = "NUM_SAMPLES")]
    num_samples: usize,

    /// Entries kept in the encode cache (0 disables it)
    #[arg(long, default_value_t = 1024, env = "SONORA_ENCODE_CACHE")]
    encode_cache_capacity: usize,

    /// Maximum concurrent requests holding the model
    #[arg(long, default_value_t = 100, env = "MAX_CONCURRENT_REQUESTS")]
    max_concurrent: usize,

    /// Output sample rate of the built-in synthetic runtime
    #[arg(long, default_value_t = 44_100, env = "SONORA_SAMPLE_RATE")]
    sample_rate: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sonora_server=debug,sonora_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting Sonora gateway");

    let config = GatewayConfig {
        max_text_length: args.max_text_length,
        max_num_samples: args.num_samples,
        encode_cache_capacity: args.encode_cache_capacity,
        max_concurrent_requests: args.max_concurrent,
    };
    config.validate().context("invalid gateway configuration")?;
    info!(
        "Limits: max_text_length={}, num_samples={}, max_concurrent={}",
        config.max_text_length, config.max_num_samples, config.max_concurrent_requests
    );

    warn!(
        "No model backend linked in; serving the synthetic runtime at {} Hz",
        args.sample_rate
    );
    let runtime: RuntimeHandle = Arc::new(SyntheticRuntime::new(args.sample_rate));
    let state = AppState::new(runtime, config);

    let app = create_router(state.clone());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Wait for shutdown signal, then stop admitting model work.
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
    state.request_semaphore.close();
}
