// ─────────────────────────────────────────────────────────────────────────────
// consumer.rs — Upstream WebSocket consumer: connect, demultiplex by symbol,
// latency-correct eventTime, enqueue; owns reconnection and backoff.
//
// Grounded on ingestor.rs::connect_and_listen's connect/ping/close handling,
// restructured around REFACTOR_put_snapshot.py's exact per-frame contract
// (stream-prefix symbol extraction, silent drop on missing lastUpdateId,
// jittered doubling backoff with a retry-counter reset after N cycles).
// ─────────────────────────────────────────────────────────────────────────────
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::config::Config;
use crate::lifecycle::Lifecycle;
use crate::latency::LatencyTracker;
use crate::model::{Snapshot, Symbol};
use crate::queue::QueueRegistry;

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Extracts the symbol prefix from a multiplexed stream name, e.g.
/// `"btcusdt@depth20@100ms"` → `Some(Symbol("BTCUSDT"))`.
fn symbol_from_stream(stream: &str) -> Option<Symbol> {
    let prefix = stream.split('@').next()?;
    if prefix.is_empty() {
        None
    } else {
        Some(Symbol::new(prefix))
    }
}

fn parse_levels(data: &serde_json::Value, key: &str) -> Vec<(f64, f64)> {
    data.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|level| {
                    let pair = level.as_array()?;
                    let price = json_number(pair.get(0)?)?;
                    let qty = json_number(pair.get(1)?)?;
                    Some((price, qty))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn json_number(v: &serde_json::Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

/// Parses one text frame into a `(Symbol, Snapshot)` pair, applying the
/// drop rules from SPEC_FULL.md §4.D. Returns `None` on any condition that
/// should silently discard the frame.
fn parse_frame(
    text: &str,
    symbols: &[Symbol],
    lifecycle: &Lifecycle,
    latency: &LatencyTracker,
) -> Result<Option<(Symbol, Snapshot)>, crate::error::IngestError> {
    let parsed: serde_json::Value = serde_json::from_str(text)?;

    let stream = parsed.get("stream").and_then(|v| v.as_str()).unwrap_or("");
    let symbol = match symbol_from_stream(stream) {
        Some(s) => s,
        None => return Ok(None),
    };
    if !symbols.contains(&symbol) {
        return Ok(None);
    }

    if !lifecycle.is_streaming() {
        return Ok(None);
    }
    if !latency.has_samples(symbol.as_str()) {
        return Ok(None);
    }

    let data = match parsed.get("data") {
        Some(d) => d,
        None => return Ok(None),
    };
    let last_update_id = match data.get("lastUpdateId").and_then(|v| v.as_u64()) {
        Some(id) => id,
        None => return Ok(None),
    };

    let bids = parse_levels(data, "bids");
    let asks = parse_levels(data, "asks");

    let median_latency = latency.median(symbol.as_str()).max(0);
    let event_time = now_ms() - median_latency;

    Ok(Some((symbol, Snapshot { last_update_id, event_time, bids, asks })))
}

/// Runs the outer reconnect loop until shutdown is observed. Each
/// successful connection subscribes implicitly via the multiplexed
/// `ws_url` query string (already embeds every symbol's stream).
pub async fn run(
    ws_url: String,
    config: Arc<Config>,
    lifecycle: Lifecycle,
    latency: Arc<LatencyTracker>,
    queues: Arc<QueueRegistry>,
    on_first_snapshot: Option<Arc<tokio::sync::Notify>>,
) {
    let mut retry: u32 = 0;
    // Fires once *this* connection has forwarded its own first snapshot.
    // Deliberately local to this call, not `lifecycle.first_snapshot_seen`
    // (which latches process-wide and stays true long after this specific
    // connection might be unhealthy) — the hot-swap coordinator needs to
    // know whether THIS connection is proven, not whether any connection
    // ever was.
    let mut connection_proved_healthy = false;

    loop {
        if lifecycle.is_shutting_down() {
            log::info!("[CONSUMER] shutdown observed, exiting reconnect loop.");
            return;
        }

        log::info!("[CONSUMER] connecting to {}", ws_url);
        match connect_async(&ws_url).await {
            Ok((ws_stream, _)) => {
                log::info!("[CONSUMER] connected.");
                retry = 0;
                let (mut write, mut read) = ws_stream.split();

                let mut ping_ticker = tokio::time::interval(Duration::from_secs(config.ws_ping_interval_secs.max(1)));
                ping_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                let read_timeout = Duration::from_secs(config.ws_ping_timeout_secs.max(1) * 3);

                loop {
                    if lifecycle.is_shutting_down() {
                        let _ = write.send(Message::Close(None)).await;
                        return;
                    }

                    let msg = tokio::select! {
                        _ = ping_ticker.tick() => {
                            if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                                log::warn!("[CONSUMER] failed to send keepalive ping: {}. Reconnecting...", e);
                                break;
                            }
                            continue;
                        }
                        next = tokio::time::timeout(read_timeout, read.next()) => {
                            match next {
                                Ok(Some(m)) => m,
                                Ok(None) => {
                                    log::warn!("[CONSUMER] stream ended. Reconnecting...");
                                    break;
                                }
                                Err(_) => {
                                    log::warn!("[CONSUMER] read timed out. Reconnecting...");
                                    break;
                                }
                            }
                        }
                    };

                    match msg {
                        Ok(Message::Text(text)) => {
                            match parse_frame(&text, &config.symbols, &lifecycle, &latency) {
                                Ok(Some((symbol, snapshot))) => {
                                    if let Some(tx) = queues.sender(&symbol) {
                                        match tx.try_send(snapshot) {
                                            Ok(()) => {
                                                lifecycle.mark_first_snapshot();
                                                if !connection_proved_healthy {
                                                    connection_proved_healthy = true;
                                                    if let Some(notify) = &on_first_snapshot {
                                                        notify.notify_one();
                                                    }
                                                }
                                            }
                                            Err(_) => {
                                                let dropped = queues.record_drop(&symbol);
                                                log::warn!(
                                                    "[CONSUMER] queue full for {}, dropping snapshot ({} dropped total).",
                                                    symbol, dropped
                                                );
                                            }
                                        }
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => {
                                    log::warn!("[CONSUMER] malformed frame skipped: {}", e);
                                }
                            }
                        }
                        Ok(Message::Ping(payload)) => {
                            let _ = write.send(Message::Pong(payload)).await;
                        }
                        Ok(Message::Close(_)) => {
                            log::warn!("[CONSUMER] closed by server. Reconnecting...");
                            break;
                        }
                        Err(e) => {
                            log::warn!("[CONSUMER] socket error: {}. Reconnecting...", e);
                            break;
                        }
                        _ => {}
                    }
                }
            }
            Err(e) => {
                log::error!("[CONSUMER] connect failed: {}", e);
            }
        }

        if lifecycle.is_shutting_down() {
            return;
        }

        retry += 1;
        let mut backoff = (config.base_backoff_secs * 2f64.powi(retry as i32)).min(config.max_backoff_secs);
        backoff += rand::thread_rng().gen_range(0.0..1.0);
        if retry > config.reset_cycle_after {
            retry = config.reset_backoff_level;
        }
        log::info!("[CONSUMER] backing off {:.2}s (retry={})", backoff, retry);
        tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_symbol_from_stream_prefix() {
        assert_eq!(symbol_from_stream("btcusdt@depth20@100ms"), Some(Symbol::new("BTCUSDT")));
        assert_eq!(symbol_from_stream(""), None);
    }

    #[test]
    fn drops_frame_for_unconfigured_symbol() {
        let lifecycle = Lifecycle::start();
        let latency = LatencyTracker::new(10);
        latency.record("BTCUSDT", 5);
        let text = r#"{"stream":"dogeusdt@depth20@100ms","data":{"lastUpdateId":1,"bids":[],"asks":[]}}"#;
        let result = parse_frame(text, &[Symbol::new("BTCUSDT")], &lifecycle, &latency).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn drops_frame_missing_last_update_id() {
        let lifecycle = Lifecycle::start();
        let latency = LatencyTracker::new(10);
        latency.record("BTCUSDT", 5);
        let text = r#"{"stream":"btcusdt@depth20@100ms","data":{"bids":[],"asks":[]}}"#;
        let result = parse_frame(text, &[Symbol::new("BTCUSDT")], &lifecycle, &latency).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn drops_frame_while_latency_window_is_empty() {
        let lifecycle = Lifecycle::start();
        let latency = LatencyTracker::new(10);
        let text = r#"{"stream":"btcusdt@depth20@100ms","data":{"lastUpdateId":1,"bids":[],"asks":[]}}"#;
        let result = parse_frame(text, &[Symbol::new("BTCUSDT")], &lifecycle, &latency).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn drops_frame_while_gate_unset() {
        let lifecycle = Lifecycle::start();
        lifecycle.begin_shutdown();
        let latency = LatencyTracker::new(10);
        latency.record("BTCUSDT", 5);
        let text = r#"{"stream":"btcusdt@depth20@100ms","data":{"lastUpdateId":1,"bids":[],"asks":[]}}"#;
        let result = parse_frame(text, &[Symbol::new("BTCUSDT")], &lifecycle, &latency).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn accepts_a_well_formed_frame_and_corrects_event_time() {
        let lifecycle = Lifecycle::start();
        let latency = LatencyTracker::new(10);
        latency.record("BTCUSDT", 7);
        let text = r#"{"stream":"btcusdt@depth20@100ms","data":{"lastUpdateId":42,"bids":[["100.1","2.0"]],"asks":[["100.2","1.0"]]}}"#;
        let (symbol, snap) = parse_frame(text, &[Symbol::new("BTCUSDT")], &lifecycle, &latency)
            .unwrap()
            .unwrap();
        assert_eq!(symbol, Symbol::new("BTCUSDT"));
        assert_eq!(snap.last_update_id, 42);
        assert_eq!(snap.bids, vec![(100.1, 2.0)]);
        assert_eq!(snap.asks, vec![(100.2, 1.0)]);
        assert!(now_ms() - snap.event_time >= 7);
    }
}
