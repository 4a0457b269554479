//! Time-based flush decision.

/// Timestamp of the last successful flush, in milliseconds.
///
/// Starts at `0`, so with a wall clock the first submission always flushes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushClock {
    last_flush_ms: i64,
}

impl FlushClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_flush_ms(&self) -> i64 {
        self.last_flush_ms
    }

    pub(crate) fn record_flush(&mut self, now_ms: i64) {
        self.last_flush_ms = now_ms;
    }
}

/// Debounce rule: flush once more than `min_interval_ms` has passed since
/// the last flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlushPolicy {
    min_interval_ms: u64,
}

impl FlushPolicy {
    pub fn new(min_interval_ms: u64) -> Self {
        Self { min_interval_ms }
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    /// Whether a submission observed at `now_ms` should trigger a flush.
    pub fn should_flush(&self, now_ms: i64, clock: &FlushClock) -> bool {
        let elapsed = i128::from(now_ms) - i128::from(clock.last_flush_ms());
        elapsed > i128::from(self.min_interval_ms)
    }
}
