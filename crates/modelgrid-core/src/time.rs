//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in milliseconds.
///
/// Record ordering never depends on this alone — every store record also
/// carries a monotonic sequence number as tiebreaker.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
