// ─────────────────────────────────────────────────────────────────────────────
// merge.rs — Day-level merge trigger: a bounded, fire-and-forget background
// worker pool, idempotent per (symbol, day).
// ─────────────────────────────────────────────────────────────────────────────
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

use crate::model::Symbol;

/// Tracks, per symbol, which days have already had a merge submitted this
/// process — mirrors `MERGED_DAYS`/`MERGE_LOCKS` in the original archiver.
pub struct MergeTracker {
    merged: Mutex<HashSet<(Symbol, String)>>,
    permits: Arc<Semaphore>,
    lob_dir: PathBuf,
}

impl MergeTracker {
    pub fn new(lob_dir: PathBuf, worker_count: usize) -> Self {
        Self {
            merged: Mutex::new(HashSet::new()),
            permits: Arc::new(Semaphore::new(worker_count.max(1))),
            lob_dir,
        }
    }

    /// Submits a merge job for `(symbol, day)` if one has not already been
    /// submitted this process. Returns true if this call actually
    /// submitted the job, false if it was already pending/submitted.
    pub async fn trigger(&self, symbol: &Symbol, day: &str) -> bool {
        {
            let mut merged = self.merged.lock().await;
            let key = (symbol.clone(), day.to_string());
            if merged.contains(&key) {
                return false;
            }
            merged.insert(key);
        }

        let permits = self.permits.clone();
        let lob_dir = self.lob_dir.clone();
        let symbol = symbol.clone();
        let day = day.to_string();

        tokio::spawn(async move {
            let _permit = permits.acquire().await;
            if let Err(e) = merge_day(&lob_dir, &symbol, &day).await {
                log::error!("[MERGE] {} {}: {}", symbol, day, e);
            } else {
                log::info!("[MERGE] {} {} merged into daily archive.", symbol, day);
            }
        });

        true
    }
}

/// Consolidates every rotated `.zip` bucket file for `(symbol, day)` into
/// one day-level archive and removes the source directory. By the time
/// this runs, every bucket file for `day` is guaranteed to already be
/// `.zip` — rotation compresses synchronously before a merge is ever
/// triggered for the day it closes.
async fn merge_day(lob_dir: &PathBuf, symbol: &Symbol, day: &str) -> Result<(), crate::error::IngestError> {
    let src_dir = lob_dir.join("temporary").join(format!("{}_orderbook_{}", symbol, day));
    let dest = lob_dir.join(format!("{}_orderbook_{}.zip", symbol, day));

    tokio::task::spawn_blocking(move || -> Result<(), crate::error::IngestError> {
        if !src_dir.exists() {
            return Ok(());
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(&src_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "zip").unwrap_or(false))
            .collect();
        entries.sort();

        let dest_file = std::fs::File::create(&dest)?;
        let mut writer = zip::ZipWriter::new(dest_file);
        let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);

        for entry in &entries {
            let mut src = std::fs::File::open(entry)?;
            let mut src_zip = zip::ZipArchive::new(&mut src).map_err(|e| crate::error::IngestError::Merge(e.to_string()))?;
            for i in 0..src_zip.len() {
                let mut inner = src_zip.by_index(i).map_err(|e| crate::error::IngestError::Merge(e.to_string()))?;
                let name = inner.name().to_string();
                writer
                    .start_file(name, options)
                    .map_err(|e| crate::error::IngestError::Merge(e.to_string()))?;
                std::io::copy(&mut inner, &mut writer)?;
            }
        }
        writer.finish().map_err(|e| crate::error::IngestError::Merge(e.to_string()))?;

        std::fs::remove_dir_all(&src_dir)?;
        Ok(())
    })
    .await
    .map_err(|e| crate::error::IngestError::Merge(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_is_idempotent_per_symbol_day() {
        let dir = std::env::temp_dir().join(format!("lob-archiver-merge-test-{}", std::process::id()));
        let tracker = MergeTracker::new(dir, 2);
        let symbol = Symbol::new("BTCUSDT");

        let first = tracker.trigger(&symbol, "2024-05-16").await;
        let second = tracker.trigger(&symbol, "2024-05-16").await;

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn different_days_both_submit() {
        let dir = std::env::temp_dir().join(format!("lob-archiver-merge-test2-{}", std::process::id()));
        let tracker = MergeTracker::new(dir, 2);
        let symbol = Symbol::new("BTCUSDT");

        assert!(tracker.trigger(&symbol, "2024-05-16").await);
        assert!(tracker.trigger(&symbol, "2024-05-17").await);
    }
}
