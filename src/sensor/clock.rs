//! Monotonic clock and the fixed monotonic-to-epoch offset.
//!
//! Sources stamp samples with [`monotonic_now_ns`], nanoseconds since a
//! process-wide anchor. [`ClockOffset`] translates those stamps to epoch
//! milliseconds.
//!
//! The offset is captured once per service and never refreshed. Wall-clock
//! adjustments (NTP steps, manual changes) or host suspend during a long
//! session are not reflected in logged `epoch_ms` values.

use chrono::Utc;
use std::sync::OnceLock;
use std::time::Instant;

static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed on the process monotonic clock.
pub fn monotonic_now_ns() -> i64 {
    let anchor = ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_nanos() as i64
}

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// `wall_clock_now - monotonic_now`, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockOffset {
    boot_to_epoch_ms: i64,
}

impl ClockOffset {
    /// Capture the offset between the wall clock and the monotonic clock.
    pub fn capture() -> Self {
        let mono_ms = monotonic_now_ns() / 1_000_000;
        Self {
            boot_to_epoch_ms: epoch_now_ms() - mono_ms,
        }
    }

    pub fn from_millis(boot_to_epoch_ms: i64) -> Self {
        Self { boot_to_epoch_ms }
    }

    pub fn as_millis(&self) -> i64 {
        self.boot_to_epoch_ms
    }

    /// Translate a monotonic nanosecond stamp to epoch milliseconds.
    pub fn to_epoch_ms(&self, monotonic_ns: i64) -> i64 {
        self.boot_to_epoch_ms + monotonic_ns / 1_000_000
    }
}
