// ─────────────────────────────────────────────────────────────────────────────
// hotswap.rs — Scheduled replacement of the upstream connection.
//
// Grounded on original_source/binance/hotswap.py's HotSwapManager and
// schedule_backup_creation: a background timer watches the active
// connection's age; once it crosses `period - ready_ahead`, a second
// consumer is spawned against an (optionally distinct) endpoint. When that
// pending consumer reports its first healthy snapshot, the coordinator
// swaps it in and tears the old one down. asyncio.Lock/asyncio.Event
// become tokio::sync::Mutex and tokio::sync::Notify; task cancellation
// becomes JoinHandle::abort.
// ─────────────────────────────────────────────────────────────────────────────
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::consumer;
use crate::lifecycle::Lifecycle;
use crate::latency::LatencyTracker;
use crate::queue::QueueRegistry;

struct ConnectionState {
    handle: JoinHandle<()>,
    created_at: Instant,
    /// Set once *this* connection has forwarded its own first snapshot.
    /// Distinct from `lifecycle.first_snapshot_seen`, which latches
    /// process-wide on the very first snapshot of the session and stays
    /// true forever after — useless for judging whether a backup opened
    /// hours later is actually healthy.
    healthy: Arc<AtomicBool>,
}

pub struct HotSwapCoordinator {
    config: Arc<Config>,
    lifecycle: Lifecycle,
    latency: Arc<LatencyTracker>,
    queues: Arc<QueueRegistry>,
    active: Mutex<Option<ConnectionState>>,
    pending: Mutex<Option<ConnectionState>>,
}

impl HotSwapCoordinator {
    pub fn new(
        config: Arc<Config>,
        lifecycle: Lifecycle,
        latency: Arc<LatencyTracker>,
        queues: Arc<QueueRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            lifecycle,
            latency,
            queues,
            active: Mutex::new(None),
            pending: Mutex::new(None),
        })
    }

    fn spawn_consumer(self: &Arc<Self>, ws_url: String) -> ConnectionState {
        let config = self.config.clone();
        let lifecycle = self.lifecycle.clone();
        let latency = self.latency.clone();
        let queues = self.queues.clone();
        let notify = Arc::new(Notify::new());
        let healthy = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn({
            let notify = notify.clone();
            async move {
                consumer::run(ws_url, config, lifecycle, latency, queues, Some(notify)).await;
            }
        });

        tokio::spawn({
            let healthy = healthy.clone();
            async move {
                notify.notified().await;
                healthy.store(true, Ordering::SeqCst);
            }
        });

        ConnectionState { handle, created_at: Instant::now(), healthy }
    }

    /// Starts the primary connection and the age-watcher loop. Runs until
    /// shutdown is observed.
    pub async fn run(self: Arc<Self>) {
        {
            let state = self.spawn_consumer(self.config.ws_url.clone());
            *self.active.lock().await = Some(state);
        }

        let check_interval = Duration::from_secs(1);
        let period = Duration::from_secs_f64((self.config.hotswap_period_hrs * 3600.0).max(1.0));
        let ready_ahead = Duration::from_secs_f64(self.config.hotswap_ready_ahead_secs.max(0.0));
        let threshold = period.saturating_sub(ready_ahead);

        loop {
            if self.lifecycle.is_shutting_down() {
                self.graceful_shutdown().await;
                return;
            }

            tokio::time::sleep(check_interval).await;

            let should_initiate = {
                let active = self.active.lock().await;
                let pending_empty = self.pending.lock().await.is_none();
                match active.as_ref() {
                    Some(state) => pending_empty && state.created_at.elapsed() >= threshold,
                    None => false,
                }
            };

            if should_initiate {
                self.initiate_hot_swap().await;
            }

            if self.is_ready_for_handoff().await {
                self.complete_handoff().await;
            }
        }
    }

    async fn initiate_hot_swap(self: &Arc<Self>) {
        if self.lifecycle.is_shutting_down() {
            return;
        }
        let mut pending = self.pending.lock().await;
        if pending.is_some() {
            return;
        }
        log::info!("[HOTSWAP] initiating backup connection.");
        let state = self.spawn_consumer(self.config.hotswap_ws_url.clone());
        *pending = Some(state);
    }

    /// True once the pending connection (if any) has forwarded its own
    /// first snapshot and is still running.
    async fn is_ready_for_handoff(&self) -> bool {
        let pending = self.pending.lock().await;
        matches!(
            pending.as_ref(),
            Some(state) if !state.handle.is_finished() && state.healthy.load(Ordering::SeqCst)
        )
    }

    async fn complete_handoff(&self) {
        let new_active = {
            let mut pending = self.pending.lock().await;
            match pending.take() {
                Some(state) => state,
                None => return,
            }
        };

        let old_active = {
            let mut active = self.active.lock().await;
            active.replace(new_active)
        };

        log::info!("[HOTSWAP] handoff complete; tearing down previous connection.");
        if let Some(old) = old_active {
            tokio::spawn(cleanup_old_connection(old));
        }
    }

    /// Cancels `pending` (bounded 2s) then `active` (bounded 3s).
    pub async fn graceful_shutdown(&self) {
        if let Some(state) = self.pending.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), wait_or_abort(state)).await;
        }
        if let Some(state) = self.active.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(3), wait_or_abort(state)).await;
        }
    }
}

async fn cleanup_old_connection(state: ConnectionState) {
    tokio::time::sleep(Duration::from_secs(1)).await;
    state.handle.abort();
}

async fn wait_or_abort(state: ConnectionState) {
    state.handle.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Symbol;

    fn test_config() -> Config {
        Config {
            symbols: vec![Symbol::new("BTCUSDT")],
            save_interval_min: 5,
            lob_dir: std::env::temp_dir(),
            ws_url: "wss://example/a".to_string(),
            ws_ping_interval_secs: 20,
            ws_ping_timeout_secs: 10,
            base_backoff_secs: 1.0,
            max_backoff_secs: 32.0,
            reset_cycle_after: 20,
            reset_backoff_level: 1,
            snapshots_queue_max: 100,
            latency_deque_size: 10,
            hotswap_period_hrs: 12.0,
            hotswap_ready_ahead_secs: 30.0,
            hotswap_ws_url: "wss://example/b".to_string(),
            merge_worker_count: 2,
        }
    }

    #[tokio::test]
    async fn starts_with_no_active_or_pending_connection() {
        let config = Arc::new(test_config());
        let lifecycle = Lifecycle::start();
        let latency = Arc::new(LatencyTracker::new(10));
        let symbols = vec![Symbol::new("BTCUSDT")];
        let (queues, _rx) = QueueRegistry::build(&symbols, 10);
        let coordinator = HotSwapCoordinator::new(config, lifecycle, latency, Arc::new(queues));

        assert!(coordinator.active.lock().await.is_none());
        assert!(coordinator.pending.lock().await.is_none());
    }

    #[tokio::test]
    async fn graceful_shutdown_on_empty_coordinator_is_a_no_op() {
        let config = Arc::new(test_config());
        let lifecycle = Lifecycle::start();
        let latency = Arc::new(LatencyTracker::new(10));
        let symbols = vec![Symbol::new("BTCUSDT")];
        let (queues, _rx) = QueueRegistry::build(&symbols, 10);
        let coordinator = HotSwapCoordinator::new(config, lifecycle, latency, Arc::new(queues));

        coordinator.graceful_shutdown().await;
    }
}
