// ─────────────────────────────────────────────────────────────────────────────
// queue.rs — Per-symbol bounded snapshot channels
// ─────────────────────────────────────────────────────────────────────────────
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::model::{Snapshot, Symbol};

/// The sending half of one symbol's queue. Cloneable so that both the
/// active and a transient pending hot-swap consumer can hold a producer
/// handle during a handoff overlap.
pub type SnapshotSender = mpsc::Sender<Snapshot>;
pub type SnapshotReceiver = mpsc::Receiver<Snapshot>;

/// Registry of bounded per-symbol channels, constructed once at startup and
/// never replaced. The consumer holds the sender side; each writer holds
/// the receiver side for its own symbol.
pub struct QueueRegistry {
    capacity: usize,
    senders: HashMap<Symbol, SnapshotSender>,
    dropped: HashMap<Symbol, AtomicU64>,
}

impl QueueRegistry {
    /// Builds one bounded channel per symbol with capacity `capacity`,
    /// returning the registry (holding the senders) plus the map of
    /// receivers to be handed out to writer tasks.
    pub fn build(symbols: &[Symbol], capacity: usize) -> (Self, HashMap<Symbol, SnapshotReceiver>) {
        let mut senders = HashMap::with_capacity(symbols.len());
        let mut receivers = HashMap::with_capacity(symbols.len());
        let mut dropped = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            let (tx, rx) = mpsc::channel(capacity);
            senders.insert(symbol.clone(), tx);
            receivers.insert(symbol.clone(), rx);
            dropped.insert(symbol.clone(), AtomicU64::new(0));
        }
        (Self { capacity, senders, dropped }, receivers)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a clone of the sender for `symbol`, or `None` if it is not a
    /// configured symbol.
    pub fn sender(&self, symbol: &Symbol) -> Option<SnapshotSender> {
        self.senders.get(symbol).cloned()
    }

    /// Records one dropped snapshot for `symbol` and returns the cumulative
    /// drop count for that symbol. A no-op (returns 0) for an unconfigured
    /// symbol, which should never happen since `sender` already gates on it.
    pub fn record_drop(&self, symbol: &Symbol) -> u64 {
        match self.dropped.get(symbol) {
            Some(counter) => counter.fetch_add(1, Ordering::SeqCst) + 1,
            None => 0,
        }
    }

    /// Cumulative drop count for `symbol`, or 0 if unconfigured.
    pub fn dropped_count(&self, symbol: &Symbol) -> u64 {
        self.dropped.get(symbol).map(|c| c.load(Ordering::SeqCst)).unwrap_or(0)
    }
}
