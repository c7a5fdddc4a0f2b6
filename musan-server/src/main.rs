//! musan-server - track analysis microservice
//!
//! Accepts one uploaded audio file per request on `POST /analyze` and
//! returns its key, mode, tempo and embedded tag metadata as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use musan_common::config::{load_server_config, ConfigOverrides};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use musan_server::AppState;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Interface to bind
    #[arg(long, env = "MUSAN_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MUSAN_PORT")]
    port: Option<u16>,

    /// Directory for temporary upload files
    #[arg(short, long, env = "MUSAN_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// TOML config file (falls back to MUSAN_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "musan_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting musan-server (track analysis)");
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let overrides = ConfigOverrides {
        host: args.host,
        port: args.port,
        upload_dir: args.upload_dir,
    };
    let config = load_server_config(args.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;

    let upload_dir = config.upload_dir();
    std::fs::create_dir_all(&upload_dir)
        .with_context(|| format!("Failed to create upload directory {}", upload_dir.display()))?;
    info!("Upload directory: {}", upload_dir.display());

    // Engine is initialised once, before the listener accepts anything
    let addr = config.bind_addr();
    let state = AppState::new(config);
    info!("Feature analysis engine initialized");

    let app = musan_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
