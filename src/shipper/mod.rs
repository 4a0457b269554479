//! Batching log shipper.
//!
//! [`Shipper`] accepts one serialised record at a time, buffers it, and
//! flushes the buffer to a [`LogsClient`](crate::client::LogsClient) once
//! more than `flush_interval_ms` has passed since the previous flush. It
//! carries the stream's sequence token from one put to the next.
//!
//! # Lifecycle
//!
//! - [`Shipper::start_with`] builds the client, creates the log group and
//!   stream when missing, and learns the current sequence token.
//! - [`Shipper::submit`] queues a record and applies the flush policy.
//! - [`Shipper::stop`] flushes what is left and releases the client.
//!
//! There is no background thread or timer. If submissions stop, queued
//! records wait for the next submission, an explicit
//! [`Shipper::flush`], or [`Shipper::stop`].

mod batch;
mod config;
mod core;
mod error;
mod policy;

#[cfg(test)]
mod tests;

pub use batch::{Batch, MAX_BATCH_BYTES, MAX_BATCH_EVENTS, MAX_BATCH_SPAN_MS, MAX_EVENT_BYTES};
pub use config::{
    Credentials, DEFAULT_CONNECT_TIMEOUT, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_LOG_GROUP,
    DEFAULT_LOG_STREAM, DEFAULT_REGION, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WARN_INTERVAL,
    ShipperConfig,
};
pub use self::core::{Shipper, Submitted, TOKEN_DISCOVERY_MESSAGE};
pub use error::{ShipperError, StartupError};
pub use policy::{FlushClock, FlushPolicy};
