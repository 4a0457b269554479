use thiserror::Error;

use crate::client::{ClientError, SequenceToken};

/// Errors that prevent a shipper from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The remote client could not be constructed.
    #[error("failed to construct log client: {0}")]
    Client(#[source] ClientError),
    /// The log group is missing and could not be created.
    #[error("failed to create log group {log_group}: {source}")]
    CreateLogGroup {
        log_group: String,
        #[source]
        source: ClientError,
    },
    /// The log stream is missing and could not be created.
    #[error("failed to create log stream {log_group}/{log_stream}: {source}")]
    CreateLogStream {
        log_group: String,
        log_stream: String,
        #[source]
        source: ClientError,
    },
    /// The discovery write failed for a reason other than a token rejection.
    #[error("failed to discover the sequence token: {0}")]
    TokenDiscovery(#[source] ClientError),
}

/// Errors surfaced by [`Shipper::submit`](super::Shipper::submit),
/// [`Shipper::flush`](super::Shipper::flush) and
/// [`Shipper::stop`](super::Shipper::stop).
///
/// `pending` is the number of events still queued after the failure.
#[derive(Debug, Error)]
pub enum ShipperError {
    /// Submissions are rejected until the shipper has started.
    #[error("shipper has not been started")]
    NotStarted,
    /// Another writer advanced the stream; the held token has been replaced.
    #[error("sequence token rejected with {pending} events pending; next flush uses {expected:?}")]
    SequenceTokenRejected {
        expected: Option<SequenceToken>,
        pending: usize,
    },
    /// The message exceeds the per-event size limit and was not queued.
    #[error("event of {size} bytes exceeds the {limit} byte limit, {pending} events pending")]
    EventTooLarge {
        size: usize,
        limit: usize,
        pending: usize,
    },
    /// The service refused a chunk's content; its events were dropped.
    #[error("service rejected {dropped} events, {pending} events pending: {source}")]
    Rejected {
        dropped: usize,
        pending: usize,
        #[source]
        source: ClientError,
    },
    /// The put failed; the events remain queued for the next flush.
    #[error("failed to ship batch, {pending} events pending: {source}")]
    Transport {
        pending: usize,
        #[source]
        source: ClientError,
    },
}

impl ShipperError {
    /// Events still buffered after this error.
    pub fn pending(&self) -> usize {
        match self {
            Self::NotStarted => 0,
            Self::EventTooLarge { pending, .. }
            | Self::SequenceTokenRejected { pending, .. }
            | Self::Rejected { pending, .. }
            | Self::Transport { pending, .. } => *pending,
        }
    }
}
