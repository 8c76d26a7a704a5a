//! Stateless chat-completion endpoint.
//!
//! Every send is a single request carrying the document context followed by
//! the user's message. No thread, no polling.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use regassist_core::config::CompletionConfig;
use regassist_core::error::{AssistError, Result};
use regassist_core::types::BackendKind;

use crate::http::{build_client, read_json, transport_error};
use crate::{ChatBackend, SendRequest};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    model: &'a str,
    stream: bool,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct CompletionBackend {
    client: Client,
    endpoint: String,
    model: String,
}

impl CompletionBackend {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| AssistError::Config(format!("Invalid completion API key: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);

        Ok(Self {
            client: build_client(headers, config.request_timeout_secs)?,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }
}

fn prompt(context: Option<&str>, message: &str) -> String {
    match context {
        Some(text) if !text.is_empty() => format!("{}\n\n{}", text, message),
        _ => message.to_string(),
    }
}

#[async_trait]
impl ChatBackend for CompletionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Completion
    }

    async fn send(&self, request: SendRequest<'_>) -> Result<String> {
        let body = CompletionRequest {
            messages: vec![WireMessage {
                role: "user",
                content: prompt(request.context, request.message),
            }],
            model: &self.model,
            stream: false,
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("chat completion", e))?;
        let parsed: CompletionResponse = read_json(response, "chat completion").await?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                AssistError::RemoteCallFailed("Chat completion returned no choices".to_string())
            })?;
        debug!(conversation = ?request.conversation, chars = reply.len(), "Completion received");
        Ok(reply)
    }
}
