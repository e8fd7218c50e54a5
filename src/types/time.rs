//! Modification time comparison at whole-second resolution.
//!
//! Storage backends disagree on timestamp precision (nanoseconds on most
//! local filesystems, seconds for HTTP `Last-Modified`, milliseconds for some
//! object stores). Every freshness and validity comparison truncates both
//! sides to whole seconds first, so a copy written by one backend compares
//! equal to the original it was derived from on another.

use std::time::{SystemTime, UNIX_EPOCH};

/// Whole seconds since the Unix epoch, truncated toward zero.
pub fn truncate_to_second(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_secs()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_secs())
            .map(|secs| -secs)
            .unwrap_or(i64::MIN),
    }
}

/// `time <= threshold` after truncating both to whole seconds.
pub fn not_after(time: SystemTime, threshold: SystemTime) -> bool {
    truncate_to_second(time) <= truncate_to_second(threshold)
}
