//! Configuration consumed by the shipper lifecycle.
//!
//! [`ShipperBuilder`](crate::builder::ShipperBuilder) and
//! [`load_config`](crate::file_config::load_config) produce these values
//! before handing them to [`Shipper::new`](super::Shipper::new).

use std::time::Duration;

/// Log group written to when none is configured.
pub const DEFAULT_LOG_GROUP: &str = "test-log-group";
/// Log stream written to when none is configured.
pub const DEFAULT_LOG_STREAM: &str = "test-log-stream";
/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Minimum milliseconds between two flushes under steady submission.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 200;
/// Default connection timeout applied when reaching the service.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout for a whole request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default interval between rate-limited failure warnings.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Access key pair passed through to request signing.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    /// Present for temporary credentials.
    pub session_token: Option<String>,
}

impl Credentials {
    /// Construct long-lived credentials.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
        }
    }

    /// Attach a session token for temporary credentials.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Destination identity and flush policy for a [`Shipper`](super::Shipper).
#[derive(Clone, Debug)]
pub struct ShipperConfig {
    pub log_group: String,
    pub log_stream: String,
    /// Region identifier such as `eu-west-1`; [`DEFAULT_REGION`] when unset.
    pub region: Option<String>,
    /// Signing credentials; requests go unsigned when `None`.
    pub credentials: Option<Credentials>,
    /// Overrides the regional service URL.
    pub endpoint: Option<String>,
    pub flush_interval_ms: u64,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub warn_interval: Duration,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            log_group: DEFAULT_LOG_GROUP.into(),
            log_stream: DEFAULT_LOG_STREAM.into(),
            region: None,
            credentials: None,
            endpoint: None,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl ShipperConfig {
    /// The configured region, falling back to [`DEFAULT_REGION`].
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// Base URL requests are sent to.
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_owned(),
            None => format!("https://logs.{}.amazonaws.com", self.region()),
        }
    }
}
