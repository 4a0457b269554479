//! Thread-safe appender exposing a [`Shipper`] as a `log` backend.
//!
//! [`CloudWatchAppender`] wraps one shipper in a mutex held across each
//! whole submission, so concurrent callers serialise on submit, the flush
//! decision and any resulting flush. Records reach the shipper either as
//! already serialised payloads through [`CloudWatchAppender::append`], or as
//! `log` records through the [`log::Log`] implementation, which renders them
//! to JSON first.
//!
//! Failures on the `log::Log` path cannot be returned to the caller. They are
//! counted by a [`FailureWarner`] and summarised on stderr.

use std::cell::Cell;
use std::sync::OnceLock;

use log::{LevelFilter, Metadata, Record};
use parking_lot::Mutex;
use thiserror::Error;

use crate::client::{ClientError, HttpLogsClient, LogsClient};
use crate::failure_warner::{FailureWarner, eprint_summary};
use crate::serialise::serialise_record;
use crate::shipper::{Shipper, ShipperConfig, ShipperError, StartupError, Submitted};

/// Errors returned by [`CloudWatchAppender`].
#[derive(Debug, Error)]
pub enum AppenderError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Shipper(#[from] ShipperError),
    #[error("failed to serialise log record: {0}")]
    Serialise(#[from] serde_json::Error),
    /// Another global logger was installed first.
    #[error("a global logger is already installed")]
    AlreadyInstalled,
}

thread_local! {
    static IN_APPENDER: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside the appender until dropped.
struct ReentryGuard;

impl ReentryGuard {
    fn enter() -> Option<Self> {
        IN_APPENDER.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(Self)
            }
        })
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        IN_APPENDER.with(|flag| flag.set(false));
    }
}

/// True while this thread is inside an appender call.
pub(crate) fn inside_appender() -> bool {
    IN_APPENDER.with(Cell::get)
}

/// True for records emitted by this crate.
pub(crate) fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(env!("CARGO_CRATE_NAME"))
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Shares one [`Shipper`] between threads.
pub struct CloudWatchAppender<C: LogsClient = HttpLogsClient> {
    shipper: Mutex<Shipper<C>>,
    warner: FailureWarner,
    level: LevelFilter,
}

impl CloudWatchAppender<HttpLogsClient> {
    /// Start shipping with the HTTP client.
    pub fn start(&self) -> Result<(), AppenderError> {
        self.start_with(HttpLogsClient::connect)
    }
}

impl<C: LogsClient> CloudWatchAppender<C> {
    /// Create an unstarted appender reading wall-clock time.
    pub fn new(config: ShipperConfig) -> Self {
        Self::from_shipper(Shipper::new(config))
    }

    pub fn from_shipper(shipper: Shipper<C>) -> Self {
        let warner = FailureWarner::new(shipper.config().warn_interval);
        Self::with_warner(shipper, warner)
    }

    /// Use an explicit failure warner, mainly so tests can drive its clock.
    pub fn with_warner(shipper: Shipper<C>, warner: FailureWarner) -> Self {
        Self {
            shipper: Mutex::new(shipper),
            warner,
            level: LevelFilter::Trace,
        }
    }

    /// Drop `log` records less severe than `level`.
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn start_with<F>(&self, connect: F) -> Result<(), AppenderError>
    where
        F: FnOnce(&ShipperConfig) -> Result<C, ClientError>,
    {
        let _guard = ReentryGuard::enter();
        self.shipper.lock().start_with(connect)?;
        Ok(())
    }

    /// Submit an already serialised payload.
    pub fn append(&self, payload: impl Into<String>) -> Result<Submitted, AppenderError> {
        let _guard = ReentryGuard::enter();
        Ok(self.shipper.lock().submit(payload)?)
    }

    /// Render a payload for the shipper's current time and submit it
    /// stamped with that same time.
    ///
    /// `render` runs with the shipper locked, so it must not log through
    /// this appender.
    pub fn append_rendered<F>(&self, render: F) -> Result<Submitted, AppenderError>
    where
        F: FnOnce(i64) -> Result<String, serde_json::Error>,
    {
        let _guard = ReentryGuard::enter();
        let mut shipper = self.shipper.lock();
        let now = shipper.now_ms();
        let payload = render(now)?;
        Ok(shipper.submit_at(payload, now)?)
    }

    /// Serialise a `log` record to JSON and submit it.
    pub fn append_record(&self, record: &Record<'_>) -> Result<Submitted, AppenderError> {
        self.append_rendered(|now| serialise_record(record, now))
    }

    /// Ship everything queued and return how many events were sent.
    pub fn flush(&self) -> Result<usize, AppenderError> {
        let _guard = ReentryGuard::enter();
        Ok(self.shipper.lock().flush()?)
    }

    /// Drain the queue and release the client.
    pub fn stop(&self) -> Result<(), AppenderError> {
        let _guard = ReentryGuard::enter();
        let result = self.shipper.lock().stop();
        self.warner.flush(eprint_summary);
        Ok(result?)
    }

    pub fn is_started(&self) -> bool {
        self.shipper.lock().is_started()
    }

    /// Events awaiting a flush.
    pub fn pending(&self) -> usize {
        self.shipper.lock().pending()
    }

    /// Run `f` with exclusive access to the shipper.
    pub fn with_shipper<R>(&self, f: impl FnOnce(&mut Shipper<C>) -> R) -> R {
        let _guard = ReentryGuard::enter();
        f(&mut self.shipper.lock())
    }

    /// Failures counted but not yet reported.
    pub fn unreported_failures(&self) -> u64 {
        self.warner.pending()
    }

    pub(crate) fn report(&self, err: &AppenderError) {
        self.warner.record_failure(err);
        self.warner.warn_if_due(eprint_summary);
    }
}

impl<C: LogsClient> log::Log for CloudWatchAppender<C> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level && !is_own_target(metadata.target())
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Records raised while this thread already holds the shipper (for
        // example by the HTTP stack during a flush) are dropped.
        if inside_appender() {
            return;
        }
        if let Err(err) = self.append_record(record) {
            self.report(&err);
        }
    }

    fn flush(&self) {
        if inside_appender() {
            return;
        }
        if let Err(err) = CloudWatchAppender::flush(self) {
            self.report(&err);
        }
        self.warner.flush(eprint_summary);
    }
}

impl<C: LogsClient> std::fmt::Debug for CloudWatchAppender<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudWatchAppender")
            .field("shipper", &*self.shipper.lock())
            .field("level", &self.level)
            .field("warner", &self.warner)
            .finish()
    }
}

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Install `appender` as the process-wide `log` backend.
///
/// The appender is leaked so it lives for the rest of the process; the
/// returned reference is used to [`stop`](CloudWatchAppender::stop) it at
/// shutdown. `log::max_level` is raised to the appender's level.
///
/// # Errors
///
/// [`AppenderError::AlreadyInstalled`] when a global logger already exists.
pub fn install_global_logger<C: LogsClient + 'static>(
    appender: CloudWatchAppender<C>,
) -> Result<&'static CloudWatchAppender<C>, AppenderError> {
    if INSTALLED.set(()).is_err() {
        return Err(AppenderError::AlreadyInstalled);
    }
    let level = appender.level();
    let leaked: &'static CloudWatchAppender<C> = Box::leak(Box::new(appender));
    log::set_logger(leaked).map_err(|_| AppenderError::AlreadyInstalled)?;
    log::set_max_level(level);
    Ok(leaked)
}
