// ─────────────────────────────────────────────────────────────────────────────
// clock.rs — Time-block helpers: map an instant to its bucket suffix and day
// ─────────────────────────────────────────────────────────────────────────────
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

/// Returns the bucket suffix for `epoch_ms` when the UTC day is partitioned
/// into blocks of `interval_minutes` starting at 00:00. An instant that
/// falls exactly on a block boundary belongs to the later block.
///
/// Format: `YYYY-MM-DD_HHMM`, where `HHMM` is the block's start time.
pub fn suffix(interval_minutes: i64, epoch_ms: i64) -> String {
    let dt: DateTime<Utc> = Utc.timestamp_millis_opt(epoch_ms).single().unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
    let minutes_since_midnight = dt.hour() as i64 * 60 + dt.minute() as i64;
    let interval = interval_minutes.max(1);
    let block_index = minutes_since_midnight / interval;
    let block_start = block_index * interval;
    let (h, m) = (block_start / 60, block_start % 60);
    format!("{}_{:02}{:02}", dt.format("%Y-%m-%d"), h, m)
}

/// Extracts the `YYYY-MM-DD` day string from a bucket suffix.
pub fn day(suffix: &str) -> String {
    suffix.split('_').next().unwrap_or(suffix).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_boundary_block_5min() {
        // 2024-05-16 18:20:05 UTC
        let epoch_ms = 1715883605000;
        let s = suffix(5, epoch_ms);
        assert_eq!(s, "2024-05-16_1820");
        assert_eq!(day(&s), "2024-05-16");
    }

    #[test]
    fn exact_boundary_belongs_to_later_block() {
        // 2024-05-16 18:20:00.000 UTC exactly on the 5-minute boundary.
        let epoch_ms = 1715883600000;
        assert_eq!(suffix(5, epoch_ms), "2024-05-16_1820");
    }

    #[test]
    fn one_ms_before_boundary_belongs_to_earlier_block() {
        let epoch_ms = 1715883599999;
        assert_eq!(suffix(5, epoch_ms), "2024-05-16_1815");
    }

    #[test]
    fn last_block_of_day_is_short_when_interval_does_not_divide_evenly() {
        // interval = 7 minutes: 1440 / 7 is not integral, last block starts at 23:56.
        // 23:58 UTC on 2024-05-16.
        let dt = Utc.with_ymd_and_hms(2024, 5, 16, 23, 58, 0).unwrap();
        let s = suffix(7, dt.timestamp_millis());
        assert_eq!(s, "2024-05-16_2356");
    }

    #[test]
    fn day_extraction_is_pure_string_slicing() {
        assert_eq!(day("2024-05-16_0000"), "2024-05-16");
    }
}
