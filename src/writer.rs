// ─────────────────────────────────────────────────────────────────────────────
// writer.rs — Per-symbol writer: dequeue, bucket rotation, compression on
// rotation, day-merge trigger.
//
// Grounded on REFACTOR_symbol_dump_snapshot.py's rotate-then-append loop:
// on a bucket-suffix change the previous sink is closed and compressed
// before a new one is opened; on a day change (once per day, guarded by
// MergedDays) the previous day's directory is handed to the merge trigger.
// ─────────────────────────────────────────────────────────────────────────────
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock;
use crate::compress::zip_and_remove;
use crate::config::Config;
use crate::error::IngestError;
use crate::lifecycle::Lifecycle;
use crate::merge::MergeTracker;
use crate::model::{Snapshot, Symbol};
use crate::queue::SnapshotReceiver;

/// Exclusively owned by the one task running this symbol's writer loop.
struct WriterHandle {
    current_suffix: Option<String>,
    sink: Option<File>,
}

impl WriterHandle {
    fn empty() -> Self {
        Self { current_suffix: None, sink: None }
    }

    fn bucket_path(lob_dir: &Path, symbol: &Symbol, suffix: &str) -> PathBuf {
        let day = clock::day(suffix);
        lob_dir
            .join("temporary")
            .join(format!("{}_orderbook_{}", symbol, day))
            .join(format!("{}_orderbook_{}.jsonl", symbol, suffix))
    }
}

/// Drains `rx` for `symbol` until the channel closes or shutdown is
/// observed, writing each accepted snapshot to its time-bucketed file.
pub async fn run(
    symbol: Symbol,
    config: Arc<Config>,
    merge_tracker: Arc<MergeTracker>,
    lifecycle: Lifecycle,
    mut rx: SnapshotReceiver,
) {
    let mut handle = WriterHandle::empty();

    loop {
        let next = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await;
        let snapshot = match next {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => break,
            Err(_) => {
                if lifecycle.is_shutting_down() {
                    break;
                }
                continue;
            }
        };

        if !lifecycle.is_streaming() {
            continue;
        }

        if let Err(e) = write_one(&symbol, &config, &merge_tracker, &mut handle, &snapshot).await {
            log::error!("[WRITER {}] {}", symbol, e);
        }
    }

    if let Some(mut sink) = handle.sink.take() {
        let _ = sink.flush();
    }
    log::info!("[WRITER {}] channel closed, exiting.", symbol);
}

async fn write_one(
    symbol: &Symbol,
    config: &Config,
    merge_tracker: &MergeTracker,
    handle: &mut WriterHandle,
    snapshot: &Snapshot,
) -> Result<(), IngestError> {
    let suffix = clock::suffix(config.save_interval_min, snapshot.event_time);
    let day = clock::day(&suffix);

    if handle.current_suffix.as_deref() != Some(suffix.as_str()) {
        rotate(symbol, config, merge_tracker, handle, &suffix, &day).await?;
    }

    let sink = handle.sink.as_mut().ok_or_else(|| {
        IngestError::Io(format!("no open sink for {} after rotation", symbol))
    })?;

    let line = snapshot.to_jsonl()?;
    if let Err(e) = writeln!(sink, "{}", line).and_then(|_| sink.flush()) {
        handle.sink = None;
        handle.current_suffix = None;
        return Err(IngestError::Io(e.to_string()));
    }

    Ok(())
}

async fn rotate(
    symbol: &Symbol,
    config: &Config,
    merge_tracker: &MergeTracker,
    handle: &mut WriterHandle,
    suffix: &str,
    day: &str,
) -> Result<(), IngestError> {
    let prior_suffix = handle.current_suffix.take();

    if let Some(mut sink) = handle.sink.take() {
        let _ = sink.flush();
    }

    if let Some(prior) = &prior_suffix {
        let prior_path = WriterHandle::bucket_path(&config.lob_dir, symbol, prior);
        if prior_path.exists() {
            if let Err(e) = zip_and_remove(&prior_path) {
                log::error!("[WRITER {}] compression failed for {}: {}", symbol, prior_path.display(), e);
            }
        } else {
            log::error!("[WRITER {}] file not found for compression: {}", symbol, prior_path.display());
        }

        let prior_day = clock::day(prior);
        if prior_day != day {
            merge_tracker.trigger(symbol, &prior_day).await;
        }
    }

    let new_path = WriterHandle::bucket_path(&config.lob_dir, symbol, suffix);
    if let Some(parent) = new_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let sink = OpenOptions::new().create(true).append(true).open(&new_path)?;

    handle.sink = Some(sink);
    handle.current_suffix = Some(suffix.to_string());
    Ok(())
}
