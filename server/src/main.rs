//! deepscan HTTP server
//!
//! Serves the trained AI-image detector over HTTP:
//! `POST /check-image` scores a multipart upload, `GET /health` reports liveness,
//! and `/upload-hash`, `/compare` and `/detect-ai` add SHA-256 fingerprints.

mod app;
mod error;
mod hashing;
mod routes;
mod state;
mod upload;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use deepscan::backend::backend_name;
use deepscan::utils::logging::{init_logging, LogConfig};
use deepscan::DEFAULT_MODEL_PATH;
use tracing::{info, warn};

use crate::app::{build_router, DEFAULT_MAX_UPLOAD_BYTES};
use crate::state::{AppState, ModelState};

/// deepscan inference server
#[derive(Parser, Debug)]
#[command(name = "deepscan-server")]
#[command(version)]
#[command(about = "HTTP API for detecting AI-generated images")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "5001")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Model artifact base path (`.mpk` weights + `.json` config)
    #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,

    /// Maximum accepted request body size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&LogConfig::from_verbosity(cli.verbose)).map_err(anyhow::Error::msg)?;

    info!("deepscan server v{} ({} backend)", env!("CARGO_PKG_VERSION"), backend_name());

    let model_path = cli.model.clone();
    let model = tokio::task::spawn_blocking(move || ModelState::load(&model_path))
        .await
        .context("Model loading task failed")?;
    if !model.is_loaded() {
        warn!("/check-image will answer 503 until a model is available and the server restarts");
    }

    let state = Arc::new(AppState::new(model));
    let app = build_router(state, cli.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", cli.host, cli.port))?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
