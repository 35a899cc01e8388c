//! Reclaim matching server
//!
//! HTTP service wrapping the lost & found matching engine:
//!
//! - `POST /api/match/instant` - embed one item and rank candidates from
//!   the opposite collection
//! - `POST /api/match/background` - batch sweep over both collections
//! - `POST /api/match/similarity` - pairwise similarity of stored items
//! - `GET /api/match/stats` - aggregates over recent matches
//! - `GET /health` - backend and store probes
//!
//! Service objects are constructed once here and passed into the engine;
//! nothing hangs off globals. The default wiring uses the in-process
//! stores and the deterministic hash embedding backend - swap them for
//! real clients at the [`ServiceContext`] seam.

mod api;
mod state;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use reclaim_core::{
    BackgroundSweep, HashEmbedder, MatchingConfig, MatchingCoordinator, MemoryCacheStore,
    MemoryItemStore, MemoryMatchStore, ServiceContext, SweepParams,
};

use crate::state::AppState;

/// Lost & found matching service
#[derive(Debug, Parser)]
#[command(name = "reclaim-server", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 8200)]
    port: u16,

    /// Live-entry capacity of the in-process cache
    #[arg(long, default_value_t = 1000)]
    cache_capacity: usize,

    /// Seconds between automatic background sweeps (0 disables)
    #[arg(long, default_value_t = 0)]
    sweep_interval_secs: u64,

    /// Item budget per automatic sweep
    #[arg(long, default_value_t = 100)]
    sweep_limit: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!(version = reclaim_core::VERSION, "starting reclaim server");

    let services = Arc::new(ServiceContext {
        embedder: Arc::new(HashEmbedder::new()),
        items: Arc::new(MemoryItemStore::new()),
        matches: Arc::new(MemoryMatchStore::new()),
        cache: Arc::new(MemoryCacheStore::with_capacity(cli.cache_capacity)),
    });

    let config = MatchingConfig::default();
    let coordinator = Arc::new(MatchingCoordinator::new(
        Arc::clone(&services),
        config.clone(),
    ));
    let sweep = Arc::new(BackgroundSweep::new(Arc::clone(&services), config));

    if cli.sweep_interval_secs > 0 {
        let sweep_limit = cli.sweep_limit;
        let periodic = Arc::clone(&sweep);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(cli.sweep_interval_secs));
            // First tick fires immediately; skip it so startup stays quiet
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let params = SweepParams {
                    limit: sweep_limit,
                    ..SweepParams::default()
                };
                match periodic.run(params).await {
                    Ok(summary) => info!(
                        processed = summary.processed,
                        new_matches = summary.new_matches,
                        "periodic sweep finished"
                    ),
                    Err(err) => error!(error = %err, "periodic sweep failed"),
                }
            }
        });
        info!(
            interval_secs = cli.sweep_interval_secs,
            "periodic sweep enabled"
        );
    }

    let state = AppState::new(coordinator, sweep, services);
    let router = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port)).await?;
    info!(port = cli.port, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}
