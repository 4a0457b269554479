//! Validated construction of [`ShipperConfig`].
//!
//! Every setting is optional; anything left unset takes the default from
//! [`ShipperConfig::default`]. [`ShipperBuilder::build`] rejects settings the
//! shipper cannot work with before any connection is attempted.

use std::time::Duration;

use thiserror::Error;

use crate::shipper::{Credentials, ShipperConfig};

/// Errors raised while assembling a [`ShipperConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting was present but unusable.
    #[error("invalid shipper configuration: {0}")]
    InvalidConfig(String),
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid INI.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// The configuration file lacks the `[cloudwatch]` section.
    #[error("configuration has no [{0}] section")]
    MissingSection(String),
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(ConfigError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

macro_rules! string_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: impl Into<String>) -> Self {
            self.$field = Some(value.into());
            self
        }
    };
}

/// Builder for [`ShipperConfig`] values.
#[derive(Clone, Debug, Default)]
pub struct ShipperBuilder {
    log_group: Option<String>,
    log_stream: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
    session_token: Option<String>,
    flush_interval_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
}

impl ShipperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    string_setter!(
        #[doc = "Set the destination log group."]
        with_log_group,
        log_group
    );
    string_setter!(
        #[doc = "Set the destination log stream."]
        with_log_stream,
        log_stream
    );
    string_setter!(
        #[doc = "Set the service region, for example `eu-west-1`."]
        with_region,
        region
    );
    string_setter!(
        #[doc = "Send requests to this base URL instead of the regional endpoint."]
        with_endpoint,
        endpoint
    );
    string_setter!(
        #[doc = "Attach a session token to the configured key pair."]
        with_session_token,
        session_token
    );

    /// Sign requests with this key pair.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    string_setter!(with_access_key, access_key);
    string_setter!(with_secret_key, secret_key);

    option_setter!(
        #[doc = "Set the minimum milliseconds between flushes."]
        with_flush_interval_ms,
        flush_interval_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the connect timeout in milliseconds."]
        with_connect_timeout_ms,
        connect_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the whole-request timeout in milliseconds."]
        with_request_timeout_ms,
        request_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the minimum milliseconds between failure summaries."]
        with_warn_interval_ms,
        warn_interval_ms,
        u64
    );

    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_names()?;
        self.validate_intervals()?;
        self.validate_credentials()?;
        Ok(())
    }

    fn validate_names(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("log_group", &self.log_group),
            ("log_stream", &self.log_stream),
            ("region", &self.region),
            ("endpoint", &self.endpoint),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "{field} must not be empty"
                )));
            }
        }
        Ok(())
    }

    // A zero flush interval is valid: every submission after time advances
    // flushes.
    fn validate_intervals(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.request_timeout_ms {
            ensure_positive!(timeout, "request_timeout_ms")?;
        }
        if let Some(interval) = self.warn_interval_ms {
            ensure_positive!(interval, "warn_interval_ms")?;
        }
        Ok(())
    }

    fn validate_credentials(&self) -> Result<(), ConfigError> {
        match (&self.access_key, &self.secret_key) {
            (Some(_), None) => Err(ConfigError::InvalidConfig(
                "access_key requires secret_key".into(),
            )),
            (None, Some(_)) => Err(ConfigError::InvalidConfig(
                "secret_key requires access_key".into(),
            )),
            (None, None) if self.session_token.is_some() => Err(ConfigError::InvalidConfig(
                "session_token requires access_key and secret_key".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Validate the settings and produce a [`ShipperConfig`].
    pub fn build(&self) -> Result<ShipperConfig, ConfigError> {
        self.validate()?;

        let defaults = ShipperConfig::default();
        let credentials = match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => {
                let creds = Credentials::new(access.clone(), secret.clone());
                Some(match &self.session_token {
                    Some(token) => creds.with_session_token(token.clone()),
                    None => creds,
                })
            }
            _ => None,
        };
        Ok(ShipperConfig {
            log_group: self.log_group.clone().unwrap_or(defaults.log_group),
            log_stream: self.log_stream.clone().unwrap_or(defaults.log_stream),
            region: self.region.clone(),
            credentials,
            endpoint: self.endpoint.clone(),
            flush_interval_ms: self.flush_interval_ms.unwrap_or(defaults.flush_interval_ms),
            connect_timeout: self
                .connect_timeout_ms
                .map_or(defaults.connect_timeout, Duration::from_millis),
            request_timeout: self
                .request_timeout_ms
                .map_or(defaults.request_timeout, Duration::from_millis),
            warn_interval: self
                .warn_interval_ms
                .map_or(defaults.warn_interval, Duration::from_millis),
        })
    }
}
