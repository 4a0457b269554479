//! The batching shipper state machine.

use log::{debug, info, warn};

use crate::client::{ClientError, HttpLogsClient, LogsClient, PutLogEventsRequest, SequenceToken};
use crate::log_record::{LogEvent, TimeProvider, system_time_provider};

use super::batch::{Batch, MAX_EVENT_BYTES};
use super::config::ShipperConfig;
use super::error::{ShipperError, StartupError};
use super::policy::{FlushClock, FlushPolicy};

/// Message written by the token discovery put.
pub const TOKEN_DISCOVERY_MESSAGE: &str =
    "Getting the next expected sequenceToken for AwsLogsAppender";

/// Outcome of a successful [`Shipper::submit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submitted {
    /// The event is queued; the flush interval has not elapsed.
    Buffered,
    /// The submission triggered a flush of this many events.
    Flushed(usize),
}

/// Buffers serialised records and writes them to one log stream.
///
/// The shipper is driven synchronously: a [`submit`](Self::submit) that
/// crosses the flush interval performs the remote call before returning.
/// Share it between threads only behind a lock spanning the whole call, as
/// [`CloudWatchAppender`](crate::CloudWatchAppender) does.
pub struct Shipper<C: LogsClient = HttpLogsClient> {
    config: ShipperConfig,
    policy: FlushPolicy,
    client: Option<C>,
    batch: Batch,
    token: Option<SequenceToken>,
    clock: FlushClock,
    now: TimeProvider,
}

impl Shipper<HttpLogsClient> {
    /// Start using the HTTP client built from the shipper's configuration.
    pub fn start(&mut self) -> Result<(), StartupError> {
        self.start_with(HttpLogsClient::connect)
    }
}

impl<C: LogsClient> Shipper<C> {
    /// Create an unstarted shipper reading wall-clock time.
    pub fn new(config: ShipperConfig) -> Self {
        Self::with_time_provider(config, system_time_provider())
    }

    /// Create an unstarted shipper reading time from `now`.
    pub fn with_time_provider(config: ShipperConfig, now: TimeProvider) -> Self {
        Self {
            policy: FlushPolicy::new(config.flush_interval_ms),
            config,
            client: None,
            batch: Batch::new(),
            token: None,
            clock: FlushClock::new(),
            now,
        }
    }

    pub fn config(&self) -> &ShipperConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.client.is_some()
    }

    /// Number of events awaiting a flush.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Events awaiting a flush, oldest first.
    pub fn pending_events(&self) -> &[LogEvent] {
        self.batch.events()
    }

    /// Token the next put will carry.
    pub fn sequence_token(&self) -> Option<&SequenceToken> {
        self.token.as_ref()
    }

    /// Current time from the shipper's time provider, in milliseconds.
    pub fn now_ms(&self) -> i64 {
        (self.now)()
    }

    /// Time of the last successful flush in milliseconds, `0` before any.
    pub fn last_flush_ms(&self) -> i64 {
        self.clock.last_flush_ms()
    }

    /// Connect, make sure the destination exists and learn the sequence token.
    ///
    /// `connect` receives the shipper's configuration and builds the client.
    /// On error the shipper stays unstarted and keeps no client. Calling this
    /// on a started shipper does nothing.
    pub fn start_with<F>(&mut self, connect: F) -> Result<(), StartupError>
    where
        F: FnOnce(&ShipperConfig) -> Result<C, ClientError>,
    {
        if self.client.is_some() {
            warn!(
                "shipper for {}/{} is already started",
                self.config.log_group, self.config.log_stream
            );
            return Ok(());
        }

        let client = connect(&self.config).map_err(StartupError::Client)?;
        ensure_log_group(&client, &self.config.log_group)?;
        ensure_log_stream(&client, &self.config.log_group, &self.config.log_stream)?;
        if self.token.is_none() {
            self.token = discover_sequence_token(&client, &self.config, (self.now)())?;
        }

        info!(
            "shipping logs to {}/{} every {}ms",
            self.config.log_group,
            self.config.log_stream,
            self.policy.min_interval_ms()
        );
        self.client = Some(client);
        Ok(())
    }

    /// Queue `message` and flush if the interval since the last flush elapsed.
    ///
    /// # Errors
    ///
    /// [`ShipperError::NotStarted`] before [`start_with`](Self::start_with)
    /// succeeds and [`ShipperError::EventTooLarge`] for a message over
    /// [`MAX_EVENT_BYTES`]; nothing is queued in either case. Flush errors
    /// are returned as [`flush`](Self::flush) reports them.
    pub fn submit(&mut self, message: impl Into<String>) -> Result<Submitted, ShipperError> {
        let now = (self.now)();
        self.submit_at(message, now)
    }

    /// Queue `message` stamped with `timestamp_ms` and apply the flush policy
    /// at that time.
    ///
    /// Used by callers that render the message after reading
    /// [`now_ms`](Self::now_ms) so both carry the same instant. Errors as
    /// for [`submit`](Self::submit).
    pub fn submit_at(
        &mut self,
        message: impl Into<String>,
        timestamp_ms: i64,
    ) -> Result<Submitted, ShipperError> {
        if self.client.is_none() {
            return Err(ShipperError::NotStarted);
        }
        let event = LogEvent::new(message, timestamp_ms);
        let size = event.accounted_size();
        if size > MAX_EVENT_BYTES {
            return Err(ShipperError::EventTooLarge {
                size,
                limit: MAX_EVENT_BYTES,
                pending: self.batch.len(),
            });
        }
        self.batch.push(event);
        if self.policy.should_flush(timestamp_ms, &self.clock) {
            self.flush().map(Submitted::Flushed)
        } else {
            Ok(Submitted::Buffered)
        }
    }

    /// Ship every queued event and return how many were sent.
    ///
    /// An empty batch makes no remote call and leaves the flush clock alone.
    /// Batches over the service limits go out as consecutive puts, each using
    /// the token returned by the one before. On failure nothing is retried
    /// and the clock is not advanced. Events the service has not accepted
    /// stay queued, except a chunk whose content the service refused
    /// ([`ClientError::is_permanent`]): it is dropped with a warning so later
    /// events are not held behind it.
    pub fn flush(&mut self) -> Result<usize, ShipperError> {
        let Some(client) = self.client.as_ref() else {
            return Err(ShipperError::NotStarted);
        };
        if self.batch.is_empty() {
            return Ok(0);
        }

        let total = self.batch.len();
        let mut sent = 0;
        while sent < total {
            let len = self.batch.chunk_len_from(sent);
            let request = PutLogEventsRequest {
                log_group: &self.config.log_group,
                log_stream: &self.config.log_stream,
                sequence_token: self.token.as_ref(),
                events: &self.batch.events()[sent..sent + len],
            };
            match client.put_log_events(request) {
                Ok(next) => self.token = next,
                Err(ClientError::DataAlreadyAccepted { expected, .. }) => {
                    debug!("{len} events were already accepted");
                    self.token = expected;
                }
                Err(ClientError::InvalidSequenceToken { expected, .. }) => {
                    self.token = expected.clone();
                    self.batch.drain_front(sent);
                    return Err(ShipperError::SequenceTokenRejected {
                        expected,
                        pending: self.batch.len(),
                    });
                }
                Err(source) if source.is_permanent() => {
                    self.batch.drain_front(sent + len);
                    warn!(
                        "dropping {len} events refused by {}/{}: {source}",
                        self.config.log_group, self.config.log_stream
                    );
                    return Err(ShipperError::Rejected {
                        dropped: len,
                        pending: self.batch.len(),
                        source,
                    });
                }
                Err(source) => {
                    self.batch.drain_front(sent);
                    return Err(ShipperError::Transport {
                        pending: self.batch.len(),
                        source,
                    });
                }
            }
            sent += len;
        }

        self.batch.clear();
        self.clock.record_flush((self.now)());
        debug!(
            "flushed {total} events to {}/{}",
            self.config.log_group, self.config.log_stream
        );
        Ok(total)
    }

    /// Drain the batch and release the client.
    ///
    /// Safe to call on a shipper that never started. If the final flush
    /// fails the shipper stays started with the events queued, so `stop`
    /// can be retried.
    pub fn stop(&mut self) -> Result<(), ShipperError> {
        if self.client.is_none() {
            return Ok(());
        }
        if !self.batch.is_empty() {
            self.flush()?;
        }
        self.client = None;
        info!(
            "stopped shipping logs to {}/{}",
            self.config.log_group, self.config.log_stream
        );
        Ok(())
    }
}

impl<C: LogsClient> Drop for Shipper<C> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(
                "dropping {} unshipped events for {}/{}: {err}",
                err.pending(),
                self.config.log_group,
                self.config.log_stream
            );
        }
    }
}

impl<C: LogsClient> std::fmt::Debug for Shipper<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shipper")
            .field("log_group", &self.config.log_group)
            .field("log_stream", &self.config.log_stream)
            .field("started", &self.client.is_some())
            .field("pending", &self.batch.len())
            .field("sequence_token", &self.token)
            .field("last_flush_ms", &self.clock.last_flush_ms())
            .finish()
    }
}

fn ensure_log_group<C: LogsClient>(client: &C, log_group: &str) -> Result<(), StartupError> {
    match client.create_log_group(log_group) {
        Ok(()) => {
            info!("created log group {log_group}");
            Ok(())
        }
        Err(ClientError::ResourceAlreadyExists(_)) => {
            info!("log group {log_group} already exists");
            Ok(())
        }
        Err(source) => Err(StartupError::CreateLogGroup {
            log_group: log_group.to_owned(),
            source,
        }),
    }
}

fn ensure_log_stream<C: LogsClient>(
    client: &C,
    log_group: &str,
    log_stream: &str,
) -> Result<(), StartupError> {
    match client.create_log_stream(log_group, log_stream) {
        Ok(()) => {
            info!("created log stream {log_group}/{log_stream}");
            Ok(())
        }
        Err(ClientError::ResourceAlreadyExists(_)) => {
            info!("log stream {log_group}/{log_stream} already exists");
            Ok(())
        }
        Err(source) => Err(StartupError::CreateLogStream {
            log_group: log_group.to_owned(),
            log_stream: log_stream.to_owned(),
            source,
        }),
    }
}

/// Learn the token the stream expects for its next write.
///
/// The service has no call that reports it directly. A write without a
/// token either succeeds on a fresh stream, returning the next token, or is
/// rejected with the expected token attached to the error. Both outcomes are
/// success here.
fn discover_sequence_token<C: LogsClient>(
    client: &C,
    config: &ShipperConfig,
    now_ms: i64,
) -> Result<Option<SequenceToken>, StartupError> {
    let discovery = [LogEvent::new(TOKEN_DISCOVERY_MESSAGE, now_ms)];
    let request = PutLogEventsRequest {
        log_group: &config.log_group,
        log_stream: &config.log_stream,
        sequence_token: None,
        events: &discovery,
    };
    match client.put_log_events(request) {
        Ok(next) => Ok(next),
        Err(ClientError::InvalidSequenceToken { expected, .. })
        | Err(ClientError::DataAlreadyAccepted { expected, .. }) => {
            debug!("sequence token for {}/{} is {expected:?}", config.log_group, config.log_stream);
            Ok(expected)
        }
        Err(err) => Err(StartupError::TokenDiscovery(err)),
    }
}
