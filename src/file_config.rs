//! Load a [`ShipperConfig`] from an INI file.
//!
//! Settings live in a `[cloudwatch]` section:
//!
//! ```ini
//! [cloudwatch]
//! log_group = orders
//! log_stream = host-1
//! region = eu-west-1
//! access_key = AKID...
//! secret_key = ...
//! flush_interval_ms = 500
//! ```
//!
//! Recognised keys are `log_group`, `log_stream`, `region`, `access_key`,
//! `secret_key`, `session_token`, `endpoint`, `flush_interval_ms`,
//! `connect_timeout_ms`, `request_timeout_ms` and `warn_interval_ms`.
//! Unknown keys are rejected so typos do not pass silently. Values go
//! through [`ShipperBuilder`] and receive the same validation.

use std::fs;
use std::path::Path;

use ini::Ini;

use crate::builder::{ConfigError, ShipperBuilder};
use crate::shipper::ShipperConfig;

/// Section holding the shipper settings.
pub const SECTION: &str = "cloudwatch";

/// Read and parse the INI file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<ShipperConfig, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&text)
}

/// Parse INI `text` into a validated [`ShipperConfig`].
pub fn parse_config(text: &str) -> Result<ShipperConfig, ConfigError> {
    let ini = Ini::load_from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
    let section = ini
        .section(Some(SECTION))
        .ok_or_else(|| ConfigError::MissingSection(SECTION.into()))?;

    let mut builder = ShipperBuilder::new();
    for (key, value) in section.iter() {
        let value = value.trim();
        builder = match key {
            "log_group" => builder.with_log_group(value),
            "log_stream" => builder.with_log_stream(value),
            "region" => builder.with_region(value),
            "endpoint" => builder.with_endpoint(value),
            "access_key" => builder.with_access_key(value),
            "secret_key" => builder.with_secret_key(value),
            "session_token" => builder.with_session_token(value),
            "flush_interval_ms" => builder.with_flush_interval_ms(parse_millis(key, value)?),
            "connect_timeout_ms" => builder.with_connect_timeout_ms(parse_millis(key, value)?),
            "request_timeout_ms" => builder.with_request_timeout_ms(parse_millis(key, value)?),
            "warn_interval_ms" => builder.with_warn_interval_ms(parse_millis(key, value)?),
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown key {other:?} in [{SECTION}]"
                )));
            }
        };
    }
    builder.build()
}

fn parse_millis(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig(format!(
            "{key} must be a whole number of milliseconds, got {value:?}"
        ))
    })
}
