//! HTTP clients for the survey source and the clinical server.

pub mod fhir_server;
pub mod redcap;

pub use fhir_server::FhirClient;
pub use redcap::RedcapClient;

use crate::error::{ConfigError, ConfigResult, UpstreamError};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Builds the shared HTTP client; every request it sends is bounded by `timeout`.
pub fn build_http_client(timeout: Duration) -> ConfigResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ConfigError::HttpClient)
}

/// Reads the body of a successful response.
///
/// # Errors
///
/// Returns [`UpstreamError::Status`] for a non-success status and
/// [`UpstreamError::Transport`] if the body cannot be read.
pub(crate) async fn success_body(
    response: reqwest::Response,
    url: &str,
) -> Result<Vec<u8>, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response
        .bytes()
        .await
        .map_err(|source| UpstreamError::Transport {
            url: url.to_string(),
            source,
        })?;
    Ok(body.to_vec())
}

/// Decodes a JSON body, naming the path of the first mismatch.
pub(crate) fn decode_json<T: DeserializeOwned>(body: &[u8], url: &str) -> Result<T, UpstreamError> {
    let de = &mut serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(de).map_err(|e| UpstreamError::Decode {
        url: url.to_string(),
        message: format!("{} at {}", e.inner(), e.path()),
    })
}

pub(crate) fn transport(url: &str) -> impl FnOnce(reqwest::Error) -> UpstreamError + '_ {
    move |source| UpstreamError::Transport {
        url: url.to_string(),
        source,
    }
}
