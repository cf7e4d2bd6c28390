// ─────────────────────────────────────────────────────────────────────────────
// lifecycle.rs — Ingestion gate, first-snapshot latch, and shutdown flag.
//
// Generalizes the `StallPanicFlag = Arc<AtomicBool>` pattern into the three
// binary gates the pipeline needs to coordinate the consumer, the hot-swap
// coordinator, and every per-symbol writer.
// ─────────────────────────────────────────────────────────────────────────────
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type Gate = Arc<AtomicBool>;

fn new_gate(initial: bool) -> Gate {
    Arc::new(AtomicBool::new(initial))
}

/// Shared lifecycle state for the whole process.
#[derive(Clone)]
pub struct Lifecycle {
    /// Set while ingestion is accepting and persisting records.
    pub stream_enable: Gate,
    /// Latches true the first time any symbol successfully enqueues a
    /// snapshot in this process. Process-wide and one-shot — it cannot
    /// distinguish "the current connection is healthy" from "some
    /// connection was healthy at some point"; per-connection health for
    /// hot-swap handoff is tracked separately, in `hotswap.rs`.
    pub first_snapshot_seen: Gate,
    /// Set once, on shutdown; every suspension point must observe this
    /// within a bounded delay.
    pub shutdown: Gate,
}

impl Lifecycle {
    pub fn start() -> Self {
        Self {
            stream_enable: new_gate(true),
            first_snapshot_seen: new_gate(false),
            shutdown: new_gate(false),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream_enable.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn mark_first_snapshot(&self) {
        self.first_snapshot_seen.store(true, Ordering::SeqCst);
    }

    pub fn has_first_snapshot(&self) -> bool {
        self.first_snapshot_seen.load(Ordering::SeqCst)
    }

    /// Clears the ingestion gate and arms the shutdown gate. Idempotent.
    pub fn begin_shutdown(&self) {
        self.stream_enable.store(false, Ordering::SeqCst);
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_streaming_with_no_shutdown_or_first_snapshot() {
        let lc = Lifecycle::start();
        assert!(lc.is_streaming());
        assert!(!lc.is_shutting_down());
        assert!(!lc.has_first_snapshot());
    }

    #[test]
    fn begin_shutdown_clears_stream_enable_and_sets_shutdown() {
        let lc = Lifecycle::start();
        lc.begin_shutdown();
        assert!(!lc.is_streaming());
        assert!(lc.is_shutting_down());
    }

    #[test]
    fn first_snapshot_latches() {
        let lc = Lifecycle::start();
        lc.mark_first_snapshot();
        assert!(lc.has_first_snapshot());
        lc.mark_first_snapshot();
        assert!(lc.has_first_snapshot());
    }

    #[test]
    fn clone_shares_the_same_underlying_gates() {
        let lc = Lifecycle::start();
        let clone = lc.clone();
        clone.begin_shutdown();
        assert!(lc.is_shutting_down());
    }
}
