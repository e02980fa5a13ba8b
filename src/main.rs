mod api;
mod config;
mod db;
mod error;
mod grader;
mod ingest;
mod normalize;
mod pace;
mod phase;
mod recorder;
mod registry;
mod signal;
mod types;

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::grader::{Grader, RescanScheduler};
use crate::ingest::IngestService;
use crate::pace::ChangeTracker;
use crate::recorder::Recorder;
use crate::registry::MatchRegistry;
use crate::signal::SignalEngine;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Services ---
    let registry = MatchRegistry::new(pool.clone());
    let signals = SignalEngine::new(pool.clone(), cfg.trigger_percent);
    let recorder = Recorder::new(pool.clone(), signals);
    let grader = Grader::new(pool.clone());
    let ingest = Arc::new(IngestService::new(
        registry,
        recorder,
        grader.clone(),
        cfg.banned_tournaments.clone(),
    ));
    info!(
        trigger_percent = cfg.trigger_percent,
        banned = cfg.banned_tournaments.len(),
        "Ingest pipeline ready (trigger at +{:.1}% over the opening line)",
        cfg.trigger_percent,
    );

    // Rescan scheduler (background, every 300s): settles finished matches
    // the lifecycle fast path missed.
    let scheduler = RescanScheduler::new(grader.clone());
    tokio::spawn(async move { scheduler.run().await });

    // --- HTTP API server ---
    let api_state = ApiState {
        pool: pool.clone(),
        ingest,
        grader,
        changes: Arc::new(ChangeTracker::new()),
        latency: Arc::new(LatencyStats::new()),
        health: Arc::new(HealthState::new()),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
