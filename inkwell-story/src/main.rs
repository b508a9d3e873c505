//! inkwell-story - story enrichment service
//!
//! Startup order matters: subscribers are registered on the event bus before
//! the startup sweeps run and before the first request is accepted, so no
//! `story_completed` published by this process goes unhandled.

use anyhow::Result;
use clap::Parser;
use inkwell_common::config::load_config;
use inkwell_common::db::init_database;
use inkwell_common::events::EventBus;
use inkwell_common::time::secs_to_duration;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use inkwell_story::clients::{OllamaClient, StableDiffusionClient};
use inkwell_story::db::claims;
use inkwell_story::services::comic::PdfComicRenderer;
use inkwell_story::{AppState, Clients, Pipeline};

#[derive(Debug, Parser)]
#[command(name = "inkwell-story", version, about = "Story enrichment and reconciliation service")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database path (overrides config)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }

    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level)
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting inkwell-story");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database_path.display());
    info!("Working directory: {}", config.working_dir.display());

    std::fs::create_dir_all(config.comics_dir())?;
    std::fs::create_dir_all(config.images_dir())?;

    let db_pool = init_database(&config.database_path).await?;
    info!("Database connection established");

    // Single process: any claim still present was left by a previous run
    let stale = claims::clear_all(&db_pool).await?;
    if stale > 0 {
        warn!(count = stale, "Cleared artifact claims left by previous run");
    }

    let event_bus = EventBus::new(config.events.capacity);
    info!(capacity = config.events.capacity, "Event bus initialized");

    let llm = Arc::new(OllamaClient::from_config(&config.llm)?);
    let images = StableDiffusionClient::from_config(&config.image, config.working_dir.clone())?;
    if !images.has_token() {
        warn!("Image API token not configured; sentences will be stored without images");
    }

    let pipeline = Pipeline::new(
        db_pool.clone(),
        &event_bus,
        Clients {
            corrector: llm.clone(),
            images: Arc::new(images),
            critic: llm,
            renderer: Arc::new(PdfComicRenderer::new()),
        },
        config.working_dir.clone(),
        config.sweeps.claim_lease_secs,
    );
    pipeline.register_subscribers(&event_bus);

    if config.sweeps.run_on_startup {
        info!("Running startup reconciliation sweeps in background");
        pipeline.sweeps.spawn_once();
    }

    let shutdown = CancellationToken::new();
    let periodic = config
        .sweeps
        .interval_secs
        .filter(|secs| *secs > 0)
        .map(|secs| {
            info!(interval_secs = secs, "Periodic reconciliation sweeps enabled");
            pipeline
                .sweeps
                .spawn_periodic(secs_to_duration(secs), shutdown.child_token())
        });

    let state = AppState::new(db_pool, event_bus.clone(), &pipeline);
    let app = inkwell_story::build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Some(handle) = periodic {
        let _ = handle.await;
    }

    info!(in_flight = event_bus.in_flight(), "Draining event handlers");
    event_bus.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
