use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use clinic_scribe::{
    create_router, AppState, ChannelGenerationService, ChannelTranscriptionService, Config,
    StatusChannel,
};

#[derive(Debug, Parser)]
#[command(name = "clinic-scribe", about = "Clinical session documentation pipeline")]
struct Cli {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/clinic-scribe")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Recordings path: {}", cfg.storage.recordings_path);
    info!(
        "Note minimums: {} chars/section, autosave after {}s quiet",
        cfg.note.min_section_chars, cfg.note.autosave_quiet_secs
    );

    let status = StatusChannel::default();
    let transcription = Arc::new(ChannelTranscriptionService::new(status.clone()));
    let generation = Arc::new(ChannelGenerationService::new(status.clone()));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let state = AppState::new(cfg, status, transcription, generation);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server error")?;

    Ok(())
}
