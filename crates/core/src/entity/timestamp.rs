//! Timestamps for `createdAt`/`updatedAt`.
//!
//! Two writes in the same process never share a timestamp, so an update
//! always moves `updatedAt` strictly forward even on coarse clocks.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};

static LAST_MICROS: AtomicI64 = AtomicI64::new(0);

/// Returns the current time at microsecond precision, strictly greater than
/// any value previously returned in this process.
pub fn monotonic_now() -> DateTime<Utc> {
    let now = Utc::now().timestamp_micros();
    let previous = LAST_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    let micros = now.max(previous + 1);

    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

/// Formats a timestamp the way it is written into documents.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}
