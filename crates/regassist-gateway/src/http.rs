//! Shared request plumbing for the provider clients.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::warn;

use regassist_core::error::{AssistError, Result};

const ERROR_BODY_LIMIT: usize = 300;

pub(crate) fn build_client(headers: HeaderMap, timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AssistError::Config(format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn transport_error(what: &str, err: reqwest::Error) -> AssistError {
    warn!(call = what, error = %err, "Provider request failed");
    AssistError::RemoteCallFailed(format!("{} request failed: {}", what, err))
}

/// Check the status and decode the JSON body of a provider response.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        warn!(call = what, status = status.as_u16(), body = %snippet, "Provider returned error");
        return Err(AssistError::RemoteCallFailed(format!(
            "{} returned HTTP {}: {}",
            what,
            status.as_u16(),
            snippet
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AssistError::RemoteCallFailed(format!("Malformed {} response: {}", what, e)))
}
