//! Document Directory Client.
//!
//! Lists and fetches reference documents from a repository-contents
//! endpoint (GitHub's `/repos/{owner}/{repo}/contents/{path}` shape). A
//! failed listing surfaces the upstream status code and message verbatim;
//! nothing is retried.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use regassist_core::config::DirectoryConfig;
use regassist_core::error::{AssistError, Result};
use regassist_core::types::{DocumentKind, DocumentReference};

/// One entry of the contents listing. Directories have no download URL.
#[derive(Debug, Deserialize)]
struct ContentsEntry {
    name: String,
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP client for the remote document repository.
#[derive(Clone)]
pub struct DirectoryClient {
    client: Client,
    contents_url: String,
}

impl DirectoryClient {
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if !config.token.is_empty() {
            let value = HeaderValue::from_str(&format!("token {}", config.token))
                .map_err(|e| AssistError::Config(format!("Invalid directory token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| AssistError::Config(format!("Invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AssistError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            contents_url: config.contents_url.clone(),
        })
    }

    /// List every file in the repository directory.
    pub async fn list(&self) -> Result<Vec<DocumentReference>> {
        let response = self
            .client
            .get(&self.contents_url)
            .send()
            .await
            .map_err(|e| AssistError::RemoteCallFailed(format!("Document listing failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), message = %message, "Document listing rejected");
            return Err(AssistError::DirectoryUnavailable {
                status: status.as_u16(),
                message,
            });
        }

        let entries: Vec<ContentsEntry> = response.json().await.map_err(|e| {
            AssistError::RemoteCallFailed(format!("Malformed document listing: {}", e))
        })?;

        let refs: Vec<DocumentReference> = entries
            .into_iter()
            .filter_map(|e| {
                e.download_url.map(|url| DocumentReference {
                    name: e.name,
                    download_url: url,
                })
            })
            .collect();
        debug!(count = refs.len(), "Documents listed");
        Ok(refs)
    }

    /// List only the documents the extractor can read.
    pub async fn list_supported(&self) -> Result<Vec<DocumentReference>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|d| DocumentKind::from_filename(&d.name).is_some())
            .collect())
    }

    /// Download the raw bytes of a listed document.
    pub async fn fetch(&self, doc: &DocumentReference) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&doc.download_url)
            .send()
            .await
            .map_err(|e| AssistError::RemoteCallFailed(format!("Download of {} failed: {}", doc.name, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssistError::RemoteCallFailed(format!(
                "Download of {} returned HTTP {}",
                doc.name,
                status.as_u16()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            AssistError::RemoteCallFailed(format!("Download of {} failed: {}", doc.name, e))
        })?;
        debug!(document = %doc.name, bytes = bytes.len(), "Document fetched");
        Ok(bytes.to_vec())
    }
}
