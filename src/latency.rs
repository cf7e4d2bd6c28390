// ─────────────────────────────────────────────────────────────────────────────
// latency.rs — Per-symbol latency window and median, used to back-date
// `eventTime` on every ingested snapshot.
// ─────────────────────────────────────────────────────────────────────────────
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

const DEFAULT_WINDOW: usize = 10;

/// Bounded per-symbol window of recent one-way latency samples (ms), with a
/// cached median. Mirrors the bounded-deque shape of `LatencyAuditor`, but
/// tracked per symbol instead of globally, and exposing a median rather
/// than a P95.
pub struct LatencyTracker {
    window_size: usize,
    windows: Mutex<HashMap<String, VecDeque<i64>>>,
}

impl LatencyTracker {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_window() -> Self {
        Self::new(DEFAULT_WINDOW)
    }

    /// Records a new latency sample for `symbol`, evicting the oldest if the
    /// window is full. Any caller (consumer, RTT prober) may feed samples.
    pub fn record(&self, symbol: &str, sample_ms: i64) {
        let mut windows = self.windows.lock().unwrap();
        let deque = windows.entry(symbol.to_string()).or_insert_with(VecDeque::new);
        if deque.len() >= self.window_size {
            deque.pop_front();
        }
        deque.push_back(sample_ms);
    }

    /// Returns the median latency for `symbol` in milliseconds, or 0 if the
    /// window is empty. For an even-sized window, the lower of the two
    /// central values is returned.
    pub fn median(&self, symbol: &str) -> i64 {
        let windows = self.windows.lock().unwrap();
        let deque = match windows.get(symbol) {
            Some(d) if !d.is_empty() => d,
            _ => return 0,
        };
        let mut sorted: Vec<i64> = deque.iter().cloned().collect();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 1 {
            sorted[mid]
        } else {
            sorted[mid - 1]
        }
    }

    /// Returns true once at least one sample has been recorded for `symbol`.
    pub fn has_samples(&self, symbol: &str) -> bool {
        self.windows
            .lock()
            .unwrap()
            .get(symbol)
            .map(|d| !d.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_is_zero_when_empty() {
        let t = LatencyTracker::new(5);
        assert_eq!(t.median("BTCUSDT"), 0);
        assert!(!t.has_samples("BTCUSDT"));
    }

    #[test]
    fn median_odd_window() {
        let t = LatencyTracker::new(5);
        for s in [7, 3, 9] {
            t.record("BTCUSDT", s);
        }
        assert_eq!(t.median("BTCUSDT"), 7);
    }

    #[test]
    fn median_even_window_takes_lower_central_value() {
        let t = LatencyTracker::new(5);
        for s in [1, 2, 3, 4] {
            t.record("BTCUSDT", s);
        }
        // sorted: [1,2,3,4] -> lower central = 2
        assert_eq!(t.median("BTCUSDT"), 2);
    }

    #[test]
    fn window_evicts_oldest_sample() {
        let t = LatencyTracker::new(3);
        for s in [1, 2, 3, 100] {
            t.record("ETHUSDT", s);
        }
        // [2, 3, 100] -> median 3
        assert_eq!(t.median("ETHUSDT"), 3);
    }

    #[test]
    fn symbols_are_tracked_independently() {
        let t = LatencyTracker::new(5);
        t.record("BTCUSDT", 10);
        assert_eq!(t.median("ETHUSDT"), 0);
        assert_eq!(t.median("BTCUSDT"), 10);
    }
}
