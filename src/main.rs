// ─────────────────────────────────────────────────────────────────────────────
// lob-archiver: real-time order-book ingestion and archival pipeline.
//
// Connects to a multiplexed depth-snapshot WebSocket feed, demultiplexes by
// symbol, timestamps each record with a latency-corrected event time, and
// persists the per-symbol stream to time-bucketed, compressed, day-merged
// JSON-lines archives.
// ─────────────────────────────────────────────────────────────────────────────
mod clock;
mod compress;
mod config;
mod consumer;
mod error;
mod hotswap;
mod latency;
mod lifecycle;
mod merge;
mod model;
mod queue;
mod writer;

use std::sync::Arc;

use config::Config;
use hotswap::HotSwapCoordinator;
use latency::LatencyTracker;
use lifecycle::Lifecycle;
use merge::MergeTracker;
use queue::QueueRegistry;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("lob-archiver starting…");

    let config = match Config::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    log::info!("  Symbols:        {}", config.symbols.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(","));
    log::info!("  LOB dir:        {}", config.lob_dir.display());
    log::info!("  Save interval:  {} min", config.save_interval_min);
    log::info!("  WS URL:         {}", config.ws_url);

    let lifecycle = Lifecycle::start();
    let latency = Arc::new(LatencyTracker::new(config.latency_deque_size));
    let (queues, receivers) = QueueRegistry::build(&config.symbols, config.snapshots_queue_max);
    let queues = Arc::new(queues);
    let merge_tracker = Arc::new(MergeTracker::new(config.lob_dir.clone(), config.merge_worker_count));

    // One writer task per symbol.
    let mut writer_handles = Vec::with_capacity(config.symbols.len());
    for (symbol, rx) in receivers {
        let config = config.clone();
        let merge_tracker = merge_tracker.clone();
        let lifecycle = lifecycle.clone();
        writer_handles.push(tokio::spawn(async move {
            writer::run(symbol, config, merge_tracker, lifecycle, rx).await;
        }));
    }

    // Hot-swap coordinator owns the upstream connection(s) and their
    // scheduled replacement.
    let coordinator = HotSwapCoordinator::new(config.clone(), lifecycle.clone(), latency.clone(), queues.clone());
    let coordinator_handle = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.run().await }
    });

    log::info!("All systems active.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to install signal handler: {}", e);
    }
    log::info!("Shutdown signal received, draining…");
    lifecycle.begin_shutdown();

    let _ = coordinator_handle.await;
    for handle in writer_handles {
        let _ = handle.await;
    }
    log::info!("Shutdown complete.");
}
