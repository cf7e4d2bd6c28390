// ─────────────────────────────────────────────────────────────────────────────
// model.rs — Core domain types: Symbol and Snapshot
// ─────────────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, case-insensitive trading symbol. Always stored upper-cased so
/// that map lookups and on-disk paths are consistent regardless of how the
/// symbol was spelled in config or in the upstream frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Symbol::new(raw)
    }
}

/// A single price level as `(price, quantity)`.
pub type Level = (f64, f64);

/// A normalized top-N order-book snapshot for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    /// Receive-time, corrected for this symbol's median one-way latency.
    #[serde(rename = "eventTime")]
    pub event_time: i64,
    /// Sorted descending by price.
    pub bids: Vec<Level>,
    /// Sorted ascending by price.
    pub asks: Vec<Level>,
}

impl Snapshot {
    /// Serializes as a single compact JSON line with no inter-field
    /// whitespace, matching the on-disk `.jsonl` contract.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_is_upper_cased_and_trimmed() {
        assert_eq!(Symbol::new(" btcusdt ").as_str(), "BTCUSDT");
    }

    #[test]
    fn snapshot_round_trips_through_jsonl() {
        let snap = Snapshot {
            last_update_id: 42,
            event_time: 1715883605000,
            bids: vec![(100.1, 2.0), (100.0, 1.5)],
            asks: vec![(100.2, 1.0)],
        };
        let line = snap.to_jsonl().unwrap();
        assert!(!line.contains(' '));
        let back: Snapshot = serde_json::from_str(&line).unwrap();
        assert_eq!(back.last_update_id, snap.last_update_id);
        assert_eq!(back.event_time, snap.event_time);
        assert_eq!(back.bids, snap.bids);
        assert_eq!(back.asks, snap.asks);
    }

    #[test]
    fn empty_book_sides_serialize_as_empty_arrays() {
        let snap = Snapshot {
            last_update_id: 1,
            event_time: 0,
            bids: vec![],
            asks: vec![],
        };
        let line = snap.to_jsonl().unwrap();
        assert!(line.contains("\"bids\":[]"));
        assert!(line.contains("\"asks\":[]"));
    }
}
