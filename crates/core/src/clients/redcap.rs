//! Survey source client.
//!
//! The survey project is exported with a single form-encoded POST to the API endpoint. The
//! response is a flat JSON array with one object per subject and event.

use super::{decode_json, success_body, transport};
use crate::constants::SURVEY_FIELDS;
use crate::error::UpstreamError;
use crate::record::RawRecord;
use std::fmt;

/// Client for the survey export API.
#[derive(Clone)]
pub struct RedcapClient {
    endpoint: String,
    token: String,
    http: reqwest::Client,
}

impl fmt::Debug for RedcapClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedcapClient")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl RedcapClient {
    /// Creates a client for `endpoint`; a trailing `/` is added when missing.
    pub fn new(endpoint: &str, token: impl Into<String>, http: reqwest::Client) -> Self {
        let mut endpoint = endpoint.to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            endpoint,
            token: token.into(),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exports every record of the project.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if the request fails, the status is not a success, or the body
    /// is not an array of records.
    pub async fn fetch_records(&self) -> Result<Vec<RawRecord>, UpstreamError> {
        let fields = SURVEY_FIELDS.join(",");
        let form = [
            ("token", self.token.as_str()),
            ("content", "record"),
            ("format", "json"),
            ("returnFormat", "json"),
            ("type", "flat"),
            ("fields", fields.as_str()),
        ];

        tracing::debug!("exporting survey records from {}", self.endpoint);
        let response = self
            .http
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(transport(&self.endpoint))?;
        let body = success_body(response, &self.endpoint).await?;
        let records: Vec<RawRecord> = decode_json(&body, &self.endpoint)?;
        tracing::debug!("received {} survey records", records.len());
        Ok(records)
    }
}
