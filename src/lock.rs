// src/lock.rs
//! Lock countdown for staked positions

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockStatus {
    pub remaining_seconds: u64,
    pub is_locked: bool,
    pub human_readable: String,
}

/// Compute the lock status of a position at `now` (both in unix seconds)
pub fn evaluate(lock_end: i64, now: i64) -> LockStatus {
    let remaining_seconds = lock_end.saturating_sub(now).max(0) as u64;
    LockStatus {
        remaining_seconds,
        is_locked: remaining_seconds > 0,
        human_readable: format_countdown(remaining_seconds),
    }
}

/// `"{d}d {h}h {m}m {s}s"`, or `"Unlocked"` once nothing remains
pub fn format_countdown(seconds: u64) -> String {
    if seconds == 0 {
        return "Unlocked".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    format!("{}d {}h {}m {}s", days, hours, minutes, secs)
}

/// Current wall-clock time in unix seconds
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
