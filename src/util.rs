//! Small shared helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch, used to
/// timestamp events and persisted records.
///
/// Matching and time-priority ordering never depend on this value — they
/// use the book's own monotonic sequence counter (§3) — so clock skew only
/// affects display/logging, consistent with §1's "no clock synchronization
/// guarantees stronger than local monotonic time."
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
