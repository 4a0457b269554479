//! SigV4 request signing backed by `aws-sigv4`.
//!
//! The signer is built once per client from the configured credentials and
//! signs the exact URL, headers and body that go on the wire.

use std::time::SystemTime;

use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningSettings, sign};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;

use crate::shipper::Credentials;

use super::ClientError;

const SERVICE: &str = "logs";
const PROVIDER_NAME: &str = "cwlogs_appender";

/// Signs CloudWatch Logs requests for one region.
pub(crate) struct Signer {
    identity: Identity,
    region: String,
}

impl Signer {
    pub(crate) fn new(credentials: &Credentials, region: &str) -> Self {
        let credentials = aws_credential_types::Credentials::new(
            credentials.access_key.clone(),
            credentials.secret_key.clone(),
            credentials.session_token.clone(),
            None,
            PROVIDER_NAME,
        );
        Self {
            identity: credentials.into(),
            region: region.to_owned(),
        }
    }

    /// Headers to add to a `POST` of `body` to `url` at `time`.
    ///
    /// `headers` must hold every header sent besides `Host`, which is
    /// derived from `url`.
    pub(crate) fn sign(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        time: SystemTime,
    ) -> Result<Vec<(String, String)>, ClientError> {
        let params = v4::SigningParams::builder()
            .identity(&self.identity)
            .region(&self.region)
            .name(SERVICE)
            .time(time)
            .settings(SigningSettings::default())
            .build()
            .map_err(|err| ClientError::Construction(format!("signing parameters: {err}")))?
            .into();
        let request = SignableRequest::new(
            "POST",
            url,
            headers.iter().copied(),
            SignableBody::Bytes(body),
        )
        .map_err(|err| ClientError::Construction(format!("signable request: {err}")))?;
        let (instructions, _signature) = sign(request, &params)
            .map_err(|err| ClientError::Construction(format!("signing failed: {err}")))?
            .into_parts();
        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect())
    }
}
