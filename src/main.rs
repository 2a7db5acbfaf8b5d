use anyhow::{Context, Result};
use clap::Parser;
use std::future::IntoFuture;
use std::sync::Arc;
use stt_compare::{create_router, AppState, Config, WebSocketConnector};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stream one microphone to several speech-to-text providers at once
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/stt-compare")]
    config: String,

    /// Override the bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = cli.port {
        cfg.service.http.port = port;
    }

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Deepgram endpoint: {}", cfg.providers.deepgram.url);
    info!("Speechmatics endpoint: {}", cfg.providers.speechmatics.url);

    let state = AppState::new(cfg, Arc::new(WebSocketConnector));
    let registry = state.registry.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    // Open client sockets would keep a graceful shutdown waiting forever
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result.context("HTTP server failed")?,
        _ = shutdown_signal() => info!("Shutdown signal received"),
    }

    info!("Shutting down, closing {} session(s)", registry.len().await);
    registry.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
