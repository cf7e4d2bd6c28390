// ─────────────────────────────────────────────────────────────────────────────
// config.rs — Process configuration, loaded once from the environment
// (optionally pre-populated from a `.env` file) with typed defaults.
// ─────────────────────────────────────────────────────────────────────────────
use std::path::PathBuf;

use crate::error::IngestError;
use crate::model::Symbol;

#[derive(Debug, Clone)]
pub struct Config {
    pub symbols: Vec<Symbol>,
    pub save_interval_min: i64,
    pub lob_dir: PathBuf,
    pub ws_url: String,
    pub ws_ping_interval_secs: u64,
    pub ws_ping_timeout_secs: u64,
    pub base_backoff_secs: f64,
    pub max_backoff_secs: f64,
    pub reset_cycle_after: u32,
    pub reset_backoff_level: u32,
    pub snapshots_queue_max: usize,
    pub latency_deque_size: usize,
    pub hotswap_period_hrs: f64,
    pub hotswap_ready_ahead_secs: f64,
    pub hotswap_ws_url: String,
    pub merge_worker_count: usize,
}

fn parse_env_or_warn<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            log::warn!("[CONFIG] {} has an invalid value {:?}; using default.", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Builds the `WS_URL` from a base host and a list of symbols, matching
/// `stream_binance_globals.py::load_config`'s multiplexed-stream
/// construction, used only when `WS_URL` itself is not set explicitly.
fn build_ws_url(host: &str, symbols: &[Symbol]) -> String {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@depth20@100ms", s.as_str().to_lowercase()))
        .collect();
    format!("wss://{}/stream?streams={}", host, streams.join("/"))
}

impl Config {
    /// Loads configuration from process environment variables. `SYMBOLS`
    /// is the only mandatory key — everything else falls back to a typed
    /// default, logging a warning (not aborting) on a malformed value.
    pub fn from_env() -> Result<Self, IngestError> {
        let symbols_raw = std::env::var("SYMBOLS").unwrap_or_default();
        let symbols: Vec<Symbol> = symbols_raw
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(Symbol::new)
            .collect();
        if symbols.is_empty() {
            return Err(IngestError::Config(
                "SYMBOLS must be set to a non-empty comma-separated list".to_string(),
            ));
        }

        let save_interval_min = parse_env_or_warn("SAVE_INTERVAL_MIN", 5);
        let lob_dir = PathBuf::from(env_or("LOB_DIR", "./data/lob"));
        let default_host = "stream.binance.com:9443".to_string();
        let ws_url = std::env::var("WS_URL").unwrap_or_else(|_| build_ws_url(&default_host, &symbols));
        let hotswap_ws_url = std::env::var("HOTSWAP_WS_URL").unwrap_or_else(|_| ws_url.clone());

        Ok(Self {
            save_interval_min,
            lob_dir,
            ws_ping_interval_secs: parse_env_or_warn("WS_PING_INTERVAL", 20),
            ws_ping_timeout_secs: parse_env_or_warn("WS_PING_TIMEOUT", 10),
            base_backoff_secs: parse_env_or_warn("BASE_BACKOFF", 1.0),
            max_backoff_secs: parse_env_or_warn("MAX_BACKOFF", 32.0),
            reset_cycle_after: parse_env_or_warn("RESET_CYCLE_AFTER", 20),
            reset_backoff_level: parse_env_or_warn("RESET_BACKOFF_LEVEL", 1),
            snapshots_queue_max: parse_env_or_warn("SNAPSHOTS_QUEUE_MAX", 100),
            latency_deque_size: parse_env_or_warn("LATENCY_DEQUE_SIZE", 10),
            hotswap_period_hrs: parse_env_or_warn("HOTSWAP_PERIOD_HRS", 12.0),
            hotswap_ready_ahead_secs: parse_env_or_warn("HOTSWAP_READY_AHEAD_SEC", 30.0),
            merge_worker_count: parse_env_or_warn("MERGE_WORKER_COUNT", 2),
            symbols,
            ws_url,
            hotswap_ws_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_ws_url_joins_symbols_with_depth20_streams() {
        let symbols = vec![Symbol::new("btcusdt"), Symbol::new("ethusdt")];
        let url = build_ws_url("stream.binance.com:9443", &symbols);
        assert_eq!(
            url,
            "wss://stream.binance.com:9443/stream?streams=btcusdt@depth20@100ms/ethusdt@depth20@100ms"
        );
    }

    #[test]
    fn parse_env_or_warn_falls_back_on_missing_key() {
        std::env::remove_var("LOB_ARCHIVER_TEST_NONEXISTENT_KEY");
        let v: i64 = parse_env_or_warn("LOB_ARCHIVER_TEST_NONEXISTENT_KEY", 42);
        assert_eq!(v, 42);
    }
}
