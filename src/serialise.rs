//! JSON rendering of host log records.
//!
//! Produces one JSON object per record with a stable set of keys:
//! `timestamp` (RFC 3339, millisecond precision, UTC), `level`, `logger`,
//! `message`, and when known `module`, `file`, `line`, `thread` and
//! structured `fields`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Borrowed view of a record ready for serialisation.
#[derive(Debug, Serialize)]
pub struct JsonRecord<'a> {
    pub timestamp: String,
    pub level: &'static str,
    pub logger: &'a str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl<'a> JsonRecord<'a> {
    /// Start a record stamped with `timestamp_ms` and the current thread.
    pub fn new(timestamp_ms: i64, level: &'static str, logger: &'a str, message: String) -> Self {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or_default();
        Self {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            logger,
            message,
            module: None,
            file: None,
            line: None,
            thread: std::thread::current().name().map(str::to_owned),
            fields: Map::new(),
        }
    }

    /// Record for a `log` record captured at `timestamp_ms`.
    pub fn from_log(record: &'a log::Record<'a>, timestamp_ms: i64) -> Self {
        let mut json = JsonRecord::new(
            timestamp_ms,
            record.level().as_str(),
            record.target(),
            record.args().to_string(),
        );
        json.module = record.module_path();
        json.file = record.file();
        json.line = record.line();
        json
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Serialise a `log` record captured at `timestamp_ms` to a JSON string.
///
/// # Errors
///
/// Returns the `serde_json` error when the record cannot be encoded.
pub fn serialise_record(
    record: &log::Record<'_>,
    timestamp_ms: i64,
) -> Result<String, serde_json::Error> {
    JsonRecord::from_log(record, timestamp_ms).to_json()
}
