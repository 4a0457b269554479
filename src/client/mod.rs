//! Remote log-ingestion API boundary.
//!
//! [`LogsClient`] captures the three calls the shipper relies on: creating a
//! log group, creating a log stream within it, and writing a batch of events
//! under a sequence token. [`HttpLogsClient`] implements the trait against the
//! CloudWatch Logs JSON protocol; tests substitute scripted clients.
//!
//! # Wire contract
//!
//! - `create_log_group` / `create_log_stream` return
//!   [`ClientError::ResourceAlreadyExists`] when the resource is already
//!   present. Callers decide whether that counts as success.
//! - `put_log_events` returns the token the next write must carry, or fails
//!   with [`ClientError::InvalidSequenceToken`] carrying the token the service
//!   expected instead.

mod http;
mod sigv4;


use std::fmt;

use thiserror::Error;

use crate::log_record::LogEvent;

pub use http::HttpLogsClient;

/// Server-issued cursor that orders writes to a single log stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SequenceToken(String);

impl SequenceToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SequenceToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for SequenceToken {
    fn from(token: &str) -> Self {
        Self(token.to_owned())
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single batch write addressed to one destination.
#[derive(Clone, Copy, Debug)]
pub struct PutLogEventsRequest<'a> {
    pub log_group: &'a str,
    pub log_stream: &'a str,
    /// Token returned by the previous write, `None` before one is known.
    pub sequence_token: Option<&'a SequenceToken>,
    /// Events in ascending timestamp order.
    pub events: &'a [LogEvent],
}

/// Errors reported by a [`LogsClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The group or stream being created already exists.
    #[error("resource already exists: {0}")]
    ResourceAlreadyExists(String),
    /// The write carried the wrong token; `expected` is the one to use.
    #[error("invalid sequence token (expected {expected:?}): {message}")]
    InvalidSequenceToken {
        expected: Option<SequenceToken>,
        message: String,
    },
    /// The batch was already stored by an earlier write.
    #[error("data already accepted (expected {expected:?}): {message}")]
    DataAlreadyAccepted {
        expected: Option<SequenceToken>,
        message: String,
    },
    /// Any other error response returned by the service.
    #[error("service error {status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },
    /// Connection, TLS or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),
    /// The client could not be built from the supplied configuration.
    #[error("failed to construct client: {0}")]
    Construction(String),
    /// A successful response body could not be understood.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// 4xx codes that describe the caller's situation rather than the payload;
/// resending the same events can succeed later.
const RETRYABLE_CLIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "ServiceUnavailableException",
    "LimitExceededException",
    "AccessDeniedException",
    "UnrecognizedClientException",
    "ExpiredTokenException",
    "InvalidSignatureException",
    "IncompleteSignature",
    "MissingAuthenticationTokenException",
    "RequestExpired",
    "ResourceNotFoundException",
];

impl ClientError {
    /// Whether the service refused the request content itself.
    ///
    /// Resending the same events after a permanent error fails the same
    /// way. Transport failures, 5xx, 429 and credential, throttling or
    /// missing-resource responses are not permanent.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Service { status, code, .. } => {
                (400..500).contains(status)
                    && *status != 429
                    && !RETRYABLE_CLIENT_CODES.contains(&code.as_str())
            }
            _ => false,
        }
    }
}

/// Operations the shipper needs from the log-ingestion service.
///
/// Implementations must be `Send` so a shipper can be shared behind a lock.
pub trait LogsClient: Send {
    /// Create `log_group`.
    fn create_log_group(&self, log_group: &str) -> Result<(), ClientError>;

    /// Create `log_stream` inside `log_group`.
    fn create_log_stream(&self, log_group: &str, log_stream: &str) -> Result<(), ClientError>;

    /// Write a batch and return the token for the next write.
    fn put_log_events(
        &self,
        request: PutLogEventsRequest<'_>,
    ) -> Result<Option<SequenceToken>, ClientError>;
}

impl<T: LogsClient + Sync + ?Sized> LogsClient for std::sync::Arc<T> {
    fn create_log_group(&self, log_group: &str) -> Result<(), ClientError> {
        (**self).create_log_group(log_group)
    }

    fn create_log_stream(&self, log_group: &str, log_stream: &str) -> Result<(), ClientError> {
        (**self).create_log_stream(log_group, log_stream)
    }

    fn put_log_events(
        &self,
        request: PutLogEventsRequest<'_>,
    ) -> Result<Option<SequenceToken>, ClientError> {
        (**self).put_log_events(request)
    }
}

impl<T: LogsClient + ?Sized> LogsClient for Box<T> {
    fn create_log_group(&self, log_group: &str) -> Result<(), ClientError> {
        (**self).create_log_group(log_group)
    }

    fn create_log_stream(&self, log_group: &str, log_stream: &str) -> Result<(), ClientError> {
        (**self).create_log_stream(log_group, log_stream)
    }

    fn put_log_events(
        &self,
        request: PutLogEventsRequest<'_>,
    ) -> Result<Option<SequenceToken>, ClientError> {
        (**self).put_log_events(request)
    }
}
