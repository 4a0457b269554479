//! Blocking client for the CloudWatch Logs JSON protocol.
//!
//! Every call is a `POST` to the endpoint's base path carrying an
//! `X-Amz-Target` header naming the operation and an
//! `application/x-amz-json-1.1` body. The client keeps a `ureq::Agent` for
//! connection pooling and signs requests with SigV4 when credentials are
//! configured.

use std::sync::Arc;
use std::time::SystemTime;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use ureq::{Agent, AgentBuilder};

use crate::log_record::LogEvent;
use crate::shipper::ShipperConfig;

use super::sigv4::Signer;
use super::{ClientError, LogsClient, PutLogEventsRequest, SequenceToken};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "Logs_20140328";

/// [`LogsClient`] speaking HTTP to a CloudWatch-Logs-compatible endpoint.
pub struct HttpLogsClient {
    agent: Agent,
    endpoint: String,
    region: String,
    signer: Option<Signer>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogGroupBody<'a> {
    log_group_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogStreamBody<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsBody<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
    log_events: Vec<InputLogEvent<'a>>,
}

#[derive(Serialize)]
struct InputLogEvent<'a> {
    timestamp: i64,
    message: &'a str,
}

impl<'a> From<&'a LogEvent> for InputLogEvent<'a> {
    fn from(event: &'a LogEvent) -> Self {
        Self {
            timestamp: event.timestamp(),
            message: event.message(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<String>,
    rejected_log_events_info: Option<RejectedLogEventsInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectedLogEventsInfo {
    too_new_log_event_start_index: Option<u64>,
    too_old_log_event_end_index: Option<u64>,
    expired_log_event_end_index: Option<u64>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
    #[serde(rename = "expectedSequenceToken")]
    expected_sequence_token: Option<String>,
}

impl HttpLogsClient {
    /// Build a client for the destination described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Construction`] when the TLS connector cannot be
    /// initialised or the endpoint URL is not `http://` or `https://`.
    pub fn connect(config: &ShipperConfig) -> Result<Self, ClientError> {
        let endpoint = config.endpoint_url();
        authority(&endpoint)?;
        let tls = native_tls::TlsConnector::new()
            .map_err(|err| ClientError::Construction(format!("TLS setup failed: {err}")))?;
        let agent = AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout(config.request_timeout)
            .tls_connector(Arc::new(tls))
            .build();
        let region = config.region().to_owned();
        let signer = config
            .credentials
            .as_ref()
            .map(|credentials| Signer::new(credentials, &region));
        Ok(Self {
            agent,
            endpoint,
            region,
            signer,
        })
    }

    /// Base URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call<B: Serialize>(&self, operation: &str, body: &B) -> Result<String, ClientError> {
        let payload = serde_json::to_string(body)
            .map_err(|err| ClientError::Construction(format!("request encoding: {err}")))?;
        let target = format!("{TARGET_PREFIX}.{operation}");
        let url = format!("{}/", self.endpoint);
        let headers = [("content-type", CONTENT_TYPE), ("x-amz-target", target.as_str())];

        let mut request = self.agent.post(&url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        if let Some(signer) = &self.signer {
            let signed = signer.sign(&url, &headers, payload.as_bytes(), SystemTime::now())?;
            for (name, value) in &signed {
                request = request.set(name, value);
            }
        }

        match request.send_string(&payload) {
            Ok(response) => response
                .into_string()
                .map_err(|err| ClientError::Decode(err.to_string())),
            Err(ureq::Error::Status(status, response)) => {
                let header_kind = response.header("x-amzn-ErrorType").map(str::to_owned);
                let body = response.into_string().unwrap_or_default();
                Err(classify_error(status, header_kind.as_deref(), &body))
            }
            Err(ureq::Error::Transport(err)) => Err(ClientError::Transport(err.to_string())),
        }
    }
}

impl LogsClient for HttpLogsClient {
    fn create_log_group(&self, log_group: &str) -> Result<(), ClientError> {
        self.call(
            "CreateLogGroup",
            &CreateLogGroupBody {
                log_group_name: log_group,
            },
        )
        .map(drop)
    }

    fn create_log_stream(&self, log_group: &str, log_stream: &str) -> Result<(), ClientError> {
        self.call(
            "CreateLogStream",
            &CreateLogStreamBody {
                log_group_name: log_group,
                log_stream_name: log_stream,
            },
        )
        .map(drop)
    }

    fn put_log_events(
        &self,
        request: PutLogEventsRequest<'_>,
    ) -> Result<Option<SequenceToken>, ClientError> {
        let body = PutLogEventsBody {
            log_group_name: request.log_group,
            log_stream_name: request.log_stream,
            sequence_token: request.sequence_token.map(SequenceToken::as_str),
            log_events: request.events.iter().map(InputLogEvent::from).collect(),
        };
        let text = self.call("PutLogEvents", &body)?;
        let response: PutLogEventsResponse = if text.trim().is_empty() {
            PutLogEventsResponse::default()
        } else {
            serde_json::from_str(&text).map_err(|err| ClientError::Decode(err.to_string()))?
        };
        if let Some(rejected) = response.rejected_log_events_info {
            warn!(
                "CloudWatch rejected events for {}/{}: too_new_from={:?} too_old_until={:?} expired_until={:?}",
                request.log_group,
                request.log_stream,
                rejected.too_new_log_event_start_index,
                rejected.too_old_log_event_end_index,
                rejected.expired_log_event_end_index
            );
        }
        debug!(
            "put {} events to {}/{}",
            request.events.len(),
            request.log_group,
            request.log_stream
        );
        Ok(response.next_sequence_token.map(SequenceToken::from))
    }
}

impl std::fmt::Debug for HttpLogsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLogsClient")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

/// Extract `host[:port]` from an `http://` or `https://` URL.
pub(crate) fn authority(url: &str) -> Result<&str, ClientError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            ClientError::Construction(format!("endpoint {url:?} must use http or https"))
        })?;
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(ClientError::Construction(format!(
            "endpoint {url:?} has no host"
        )));
    }
    Ok(host)
}

/// Short error code from `__type` or `x-amzn-ErrorType`.
///
/// Both forms may carry a namespace (`com.amazonaws.logs#Code`) or a
/// trailing URI (`Code:http://...`).
fn error_code(raw: &str) -> &str {
    let code = raw.rsplit('#').next().unwrap_or(raw);
    code.split(':').next().unwrap_or(code)
}

/// Map a non-2xx response onto a [`ClientError`].
pub(crate) fn classify_error(status: u16, header_kind: Option<&str>, body: &str) -> ClientError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed
        .kind
        .as_deref()
        .or(header_kind)
        .map(error_code)
        .unwrap_or("Unknown")
        .to_owned();
    let message = parsed.message.unwrap_or_default();
    let expected = parsed.expected_sequence_token.map(SequenceToken::from);

    match code.as_str() {
        "ResourceAlreadyExistsException" => ClientError::ResourceAlreadyExists(message),
        "InvalidSequenceTokenException" => ClientError::InvalidSequenceToken {
            expected: expected.or_else(|| token_from_message(&message)),
            message,
        },
        "DataAlreadyAcceptedException" => ClientError::DataAlreadyAccepted {
            expected: expected.or_else(|| token_from_message(&message)),
            message,
        },
        _ => ClientError::Service {
            status,
            code,
            message,
        },
    }
}

/// Recover the token from messages such as
/// `"The given sequenceToken is invalid. The next expected sequenceToken is: 4963..."`.
fn token_from_message(message: &str) -> Option<SequenceToken> {
    let (_, tail) = message.rsplit_once("sequenceToken is:")?;
    let token = tail.trim();
    if token.is_empty() || token == "null" {
        None
    } else {
        Some(SequenceToken::new(token))
    }
}
