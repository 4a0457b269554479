//! Rate-limited reporting of records the appender could not ship.
//!
//! The appender cannot log its own failures through the logger it
//! implements, so failures are counted here and summarised on stderr at
//! most once per interval.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::log_record::{TimeProvider, system_time_provider};

/// Counts delivery failures and decides when a summary is due.
///
/// [`record_failure`](Self::record_failure) bumps the counter and keeps the
/// latest error text. [`warn_if_due`](Self::warn_if_due) hands the count and
/// that text to a callback once the interval has passed since the previous
/// summary; the first summary is always due.
pub struct FailureWarner {
    interval_ms: i64,
    last_warn_ms: AtomicI64,
    failures: AtomicU64,
    latest: Mutex<Option<String>>,
    now: TimeProvider,
}

impl FailureWarner {
    pub fn new(interval: Duration) -> Self {
        Self::with_time_provider(interval, system_time_provider())
    }

    pub fn with_time_provider(interval: Duration, now: TimeProvider) -> Self {
        Self {
            interval_ms: i64::try_from(interval.as_millis()).unwrap_or(i64::MAX),
            last_warn_ms: AtomicI64::new(i64::MIN),
            failures: AtomicU64::new(0),
            latest: Mutex::new(None),
            now,
        }
    }

    pub fn record_failure(&self, error: impl std::fmt::Display) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self.latest.lock() = Some(error.to_string());
    }

    /// Failures counted since the last summary.
    pub fn pending(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn warn_if_due(&self, warn: impl FnOnce(u64, &str)) {
        let now = (self.now)();
        let prev = self.last_warn_ms.load(Ordering::Relaxed);
        if prev != i64::MIN && now.saturating_sub(prev) < self.interval_ms {
            return;
        }
        if self
            .last_warn_ms
            .compare_exchange(prev, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.emit(warn);
        }
    }

    /// Summarise outstanding failures regardless of the interval.
    pub fn flush(&self, warn: impl FnOnce(u64, &str)) {
        self.last_warn_ms.store((self.now)(), Ordering::Relaxed);
        self.emit(warn);
    }

    fn emit(&self, warn: impl FnOnce(u64, &str)) {
        let count = self.failures.swap(0, Ordering::Relaxed);
        if count > 0 {
            let latest = self.latest.lock().take().unwrap_or_default();
            warn(count, &latest);
        }
    }
}

impl std::fmt::Debug for FailureWarner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureWarner")
            .field("interval_ms", &self.interval_ms)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Default sink writing a one-line summary to stderr.
pub(crate) fn eprint_summary(count: u64, latest: &str) {
    eprintln!("cwlogs_appender: {count} log records could not be shipped; latest error: {latest}");
}
