//! In-memory batch of events awaiting a flush.

use crate::log_record::LogEvent;

/// Maximum events CloudWatch accepts in one put.
pub const MAX_BATCH_EVENTS: usize = 10_000;
/// Maximum accounted bytes CloudWatch accepts in one put.
pub const MAX_BATCH_BYTES: usize = 1_048_576;
/// Maximum accounted bytes of a single event.
pub const MAX_EVENT_BYTES: usize = 262_144;
/// Longest time range, in milliseconds, one put may cover.
pub const MAX_BATCH_SPAN_MS: i64 = 24 * 60 * 60 * 1000;

/// Ordered buffer of events owned by a single shipper.
#[derive(Debug, Default)]
pub struct Batch {
    events: Vec<LogEvent>,
    size_bytes: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: LogEvent) {
        self.size_bytes += event.accounted_size();
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Accounted size of every buffered event.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    /// Length of the longest prefix of `events()[start..]` that fits in a put.
    ///
    /// A chunk holds at most [`MAX_BATCH_EVENTS`] events and
    /// [`MAX_BATCH_BYTES`] bytes and spans at most [`MAX_BATCH_SPAN_MS`].
    /// It is never empty while events remain.
    pub fn chunk_len_from(&self, start: usize) -> usize {
        let Some(first) = self.events.get(start) else {
            return 0;
        };
        let mut bytes = 0usize;
        let mut len = 0usize;
        for event in &self.events[start..] {
            let size = event.accounted_size();
            let over_bytes = bytes + size > MAX_BATCH_BYTES;
            let span = event.timestamp().saturating_sub(first.timestamp());
            if len == MAX_BATCH_EVENTS || (len > 0 && (over_bytes || span > MAX_BATCH_SPAN_MS)) {
                break;
            }
            bytes += size;
            len += 1;
        }
        len
    }

    /// Remove the first `count` events, keeping the rest queued.
    pub fn drain_front(&mut self, count: usize) {
        let removed: usize = self.events[..count]
            .iter()
            .map(LogEvent::accounted_size)
            .sum();
        self.events.drain(..count);
        self.size_bytes -= removed;
    }

    /// Drop every event and release the backing storage.
    pub fn clear(&mut self) {
        self.events = Vec::new();
        self.size_bytes = 0;
    }
}
