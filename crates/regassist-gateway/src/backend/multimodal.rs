//! File-aware multimodal endpoint (Gemini `generateContent` wire shape).
//!
//! The files of the current upload set are sent to the provider's media
//! upload endpoint on every send, then referenced from the first user turn
//! of a stateless chat that replays the prior history.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use regassist_core::config::MultimodalConfig;
use regassist_core::error::{AssistError, Result};
use regassist_core::types::{BackendKind, ChatMessage, Role, UploadedFile};

use crate::http::{build_client, read_json, transport_error};
use crate::{ChatBackend, SendRequest};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    uri: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    File { file_data: FileData },
}

#[derive(Debug, Serialize)]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

pub struct MultimodalBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl MultimodalBackend {
    pub fn new(config: &MultimodalConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| AssistError::Config(format!("Invalid multimodal API key: {}", e)))?;
        headers.insert(API_KEY_HEADER, key);

        Ok(Self {
            client: build_client(headers, config.request_timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    async fn upload(&self, file: &UploadedFile) -> Result<RemoteFile> {
        let response = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .query(&[("uploadType", "media")])
            .header(CONTENT_TYPE, file.media_type.as_str())
            .body(file.content.clone())
            .send()
            .await
            .map_err(|e| transport_error("file upload", e))?;
        let uploaded: UploadResponse = read_json(response, "file upload").await?;
        debug!(file = %file.filename, uri = %uploaded.file.uri, "File uploaded");
        Ok(uploaded.file)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error("generate content", e))?;
        let parsed: GenerateResponse = read_json(response, "generate content").await?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            warn!(reason = %reason, "Multimodal prompt blocked");
            return Err(AssistError::RemoteCallFailed(format!(
                "Prompt blocked by provider: {}",
                reason
            )));
        }

        let content = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| {
                AssistError::RemoteCallFailed("Generate content returned no candidates".to_string())
            })?;
        Ok(content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<String>())
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// History plus the new message, with the file references prepended to the
/// first turn so roles keep alternating.
fn build_contents(files: &[RemoteFile], history: &[ChatMessage], message: &str) -> Vec<Content> {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|m| Content {
            role: wire_role(m.role),
            parts: vec![Part::Text {
                text: m.content.clone(),
            }],
        })
        .collect();
    contents.push(Content {
        role: "user",
        parts: vec![Part::Text {
            text: message.to_string(),
        }],
    });

    if !files.is_empty() {
        let file_parts = files.iter().map(|f| Part::File {
            file_data: FileData {
                mime_type: f.mime_type.clone(),
                file_uri: f.uri.clone(),
            },
        });
        // contents is never empty here: the new message was just pushed.
        let first = &mut contents[0];
        first.parts.splice(0..0, file_parts);
    }
    contents
}

#[async_trait]
impl ChatBackend for MultimodalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Multimodal
    }

    async fn send(&self, request: SendRequest<'_>) -> Result<String> {
        let mut remote = Vec::new();
        if let Some(set) = request.files {
            for file in &set.files {
                remote.push(self.upload(file).await?);
            }
        }

        let body = GenerateRequest {
            contents: build_contents(&remote, request.history, request.message),
        };
        let reply = self.generate(&body).await?;
        debug!(conversation = ?request.conversation, files = remote.len(), chars = reply.len(), "Multimodal reply received");
        Ok(reply)
    }
}
