//! Batching log appender for CloudWatch Logs.
//!
//! Records are buffered by a [`Shipper`] and written to one log group and
//! stream at most once per flush interval, on the submitting thread. The
//! stream's sequence token is carried from each write to the next.
//! [`CloudWatchAppender`] shares a shipper between threads and plugs it into
//! the `log` facade; with the `tracing-compat` feature [`CloudWatchLayer`]
//! does the same for `tracing`.
//!
//! ```no_run
//! use cwlogs_appender::{CloudWatchAppender, ShipperBuilder, install_global_logger};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ShipperBuilder::new()
//!     .with_log_group("orders")
//!     .with_log_stream("host-1")
//!     .with_region("eu-west-1")
//!     .build()?;
//! let appender: CloudWatchAppender = CloudWatchAppender::new(config);
//! appender.start()?;
//! let appender = install_global_logger(appender)?;
//! log::info!("order placed");
//! appender.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod appender;
pub mod builder;
pub mod client;
mod failure_warner;
pub mod file_config;
pub mod log_record;
pub mod serialise;
pub mod shipper;
#[cfg(feature = "tracing-compat")]
pub mod tracing_compat;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use appender::{AppenderError, CloudWatchAppender, install_global_logger};
pub use builder::{ConfigError, ShipperBuilder};
pub use client::{ClientError, HttpLogsClient, LogsClient, PutLogEventsRequest, SequenceToken};
pub use failure_warner::FailureWarner;
pub use file_config::{load_config, parse_config};
pub use log_record::{LogEvent, TimeProvider};
pub use shipper::{
    Credentials, Shipper, ShipperConfig, ShipperError, StartupError, Submitted,
};
#[cfg(feature = "tracing-compat")]
pub use tracing_compat::CloudWatchLayer;
