//! Event representation for the shipper.
//!
//! A [`LogEvent`] is the unit the shipper buffers: an already serialised
//! payload paired with the time it was captured. The shipper never inspects
//! the payload; it only orders, sizes and forwards it.

use std::fmt;

/// Supplies the current time in milliseconds since the UNIX epoch.
pub type TimeProvider = Box<dyn Fn() -> i64 + Send + Sync>;

/// Per-event overhead CloudWatch adds when accounting a batch size.
pub const EVENT_OVERHEAD_BYTES: usize = 26;

/// Returns the current wall-clock time in milliseconds since the UNIX epoch.
pub fn system_time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Wrap [`system_time_millis`] as a boxed [`TimeProvider`].
pub fn system_time_provider() -> TimeProvider {
    Box::new(system_time_millis)
}

/// A serialised log record and its capture timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    message: String,
    timestamp: i64,
}

impl LogEvent {
    /// Construct an event captured at `timestamp` milliseconds.
    pub fn new(message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }

    /// The serialised payload.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Capture time in milliseconds since the UNIX epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Bytes this event contributes to a put request's size limit.
    pub fn accounted_size(&self) -> usize {
        self.message.len() + EVENT_OVERHEAD_BYTES
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.timestamp, self.message)
    }
}
