//! Hosted assistant with server-side threads (OpenAI Assistants v2 wire shape).
//!
//! A send appends the user message to the slot's thread, starts a run of the
//! configured assistant, polls the run until it is terminal and then reads
//! back the newest assistant-authored message.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use regassist_core::config::AssistantConfig;
use regassist_core::error::{AssistError, Result};
use regassist_core::types::{BackendKind, ThreadHandle};

use super::context_message;
use crate::http::{build_client, read_json, transport_error};
use crate::poll::{poll_until_done, PollPolicy, PollStep};
use crate::{ChatBackend, SendRequest};

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: RunStatus,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RunStatus {
    Queued,
    InProgress,
    Cancelling,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Cancelling => "cancelling",
            Self::RequiresAction => "requires_action",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
            Self::Unknown => "unknown",
        }
    }

    /// Terminal without a reply. `requires_action` counts: no tool outputs
    /// are ever submitted, so such a run would never finish.
    fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Cancelled | Self::Expired | Self::Incomplete | Self::RequiresAction
        )
    }
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    value: String,
}

/// Client for the thread/run assistant API.
pub struct AssistantBackend {
    client: Client,
    base_url: String,
    assistant_id: String,
    policy: PollPolicy,
}

impl AssistantBackend {
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| AssistError::Config(format!("Invalid assistant API key: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("openai-beta", HeaderValue::from_static("assistants=v2"));

        Ok(Self {
            client: build_client(headers, config.request_timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            assistant_id: config.assistant_id.clone(),
            policy: PollPolicy::from(config),
        })
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn create_thread(&self) -> Result<ThreadHandle> {
        let response = self
            .client
            .post(format!("{}/threads", self.base_url))
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| transport_error("create thread", e))?;
        let thread: ThreadObject = read_json(response, "create thread").await?;
        Ok(ThreadHandle::new(thread.id))
    }

    async fn add_message(&self, thread: &ThreadHandle, content: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/threads/{}/messages", self.base_url, thread))
            .json(&json!({ "role": "user", "content": content }))
            .send()
            .await
            .map_err(|e| transport_error("add message", e))?;
        let _: serde_json::Value = read_json(response, "add message").await?;
        Ok(())
    }

    async fn create_run(&self, thread: &ThreadHandle) -> Result<RunObject> {
        let response = self
            .client
            .post(format!("{}/threads/{}/runs", self.base_url, thread))
            .json(&json!({ "assistant_id": self.assistant_id }))
            .send()
            .await
            .map_err(|e| transport_error("create run", e))?;
        read_json(response, "create run").await
    }

    async fn retrieve_run(&self, thread: &ThreadHandle, run_id: &str) -> Result<RunObject> {
        let response = self
            .client
            .get(format!("{}/threads/{}/runs/{}", self.base_url, thread, run_id))
            .send()
            .await
            .map_err(|e| transport_error("retrieve run", e))?;
        read_json(response, "retrieve run").await
    }

    /// Ask the provider to stop a run nobody is waiting for. Failures are
    /// only logged.
    async fn abandon_run(&self, thread: &ThreadHandle, run_id: &str) {
        let result = self
            .client
            .post(format!(
                "{}/threads/{}/runs/{}/cancel",
                self.base_url, thread, run_id
            ))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!(thread = %thread, run = %run_id, "Abandoned run cancelled");
            }
            Ok(response) => {
                warn!(thread = %thread, run = %run_id, status = response.status().as_u16(), "Run cancel rejected");
            }
            Err(e) => {
                warn!(thread = %thread, run = %run_id, error = %e, "Run cancel request failed");
            }
        }
    }

    /// Text of the newest assistant message, or empty if there is none.
    async fn latest_reply(&self, thread: &ThreadHandle) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/threads/{}/messages", self.base_url, thread))
            .query(&[("order", "desc"), ("limit", "20")])
            .send()
            .await
            .map_err(|e| transport_error("list messages", e))?;
        let list: MessageList = read_json(response, "list messages").await?;

        let reply = list
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .map(|m| {
                m.content
                    .into_iter()
                    .filter_map(|part| part.text.map(|t| t.value))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        Ok(reply)
    }

    fn check_run(run: &RunObject) -> Result<PollStep<()>> {
        if run.status == RunStatus::Completed {
            return Ok(PollStep::Done(()));
        }
        if run.status.is_failure() {
            let detail = run
                .last_error
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or_default();
            warn!(run = %run.id, status = run.status.as_str(), error = %detail, "Assistant run did not complete");
            return Err(AssistError::RemoteJobFailed {
                status: run.status.as_str().to_string(),
            });
        }
        Ok(PollStep::Pending)
    }
}

#[async_trait]
impl ChatBackend for AssistantBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Assistant
    }

    async fn send(&self, mut request: SendRequest<'_>) -> Result<String> {
        let thread = match request.thread.as_ref() {
            Some(thread) => thread.clone(),
            None => {
                let thread = self.create_thread().await?;
                info!(conversation = ?request.conversation, thread = %thread, "Assistant thread created");
                if let Some(text) = request.context {
                    self.add_message(&thread, &context_message(text)).await?;
                    debug!(thread = %thread, chars = text.len(), "Thread seeded with document context");
                }
                *request.thread = Some(thread.clone());
                thread
            }
        };

        self.add_message(&thread, request.message).await?;
        let run = self.create_run(&thread).await?;
        debug!(thread = %thread, run = %run.id, status = run.status.as_str(), "Run started");

        if let PollStep::Pending = Self::check_run(&run)? {
            let thread = &thread;
            let run_id = run.id.as_str();
            let polled = poll_until_done(self.policy, request.cancel, move |attempt| async move {
                let run = self.retrieve_run(thread, run_id).await?;
                debug!(run = %run.id, attempt, status = run.status.as_str(), "Run polled");
                Self::check_run(&run)
            })
            .await;

            match polled {
                Ok(()) => {}
                // The run may still be active; the thread rejects new
                // messages until it ends, so the slot starts a fresh one.
                Err(e @ (AssistError::Cancelled | AssistError::RemoteJobTimedOut { .. })) => {
                    self.abandon_run(thread, run_id).await;
                    *request.thread = None;
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        self.latest_reply(&thread).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use regassist_core::types::ConversationId;
    use tokio::sync::watch;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer, max_attempts: u32) -> AssistantBackend {
        let config = AssistantConfig {
            base_url: server.uri(),
            api_key: "sk-test".to_string(),
            assistant_id: "asst_1".to_string(),
            ..AssistantConfig::default()
        };
        AssistantBackend::new(&config).unwrap().with_policy(PollPolicy {
            interval: Duration::from_millis(5),
            max_attempts,
        })
    }

    async fn mount_thread_and_messages(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/threads"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("openai-beta", "assistants=v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "thread_1"})))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_1"})))
            .mount(server)
            .await;
    }

    fn run(status: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"id": "run_1", "status": status}))
    }

    #[tokio::test]
    async fn test_send_creates_thread_polls_and_returns_reply() {
        let server = MockServer::start().await;
        mount_thread_and_messages(&server).await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .and(body_partial_json(json!({"assistant_id": "asst_1"})))
            .respond_with(run("queued"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(run("completed"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .and(query_param("order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"role": "assistant", "content": [{"type": "text", "text": {"value": "Rule 12 applies."}}]},
                    {"role": "user", "content": [{"type": "text", "text": {"value": "Which rule?"}}]},
                    {"role": "assistant", "content": [{"type": "text", "text": {"value": "older"}}]}
                ]
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server, 5);
        let mut thread = None;
        let reply = backend
            .send(SendRequest::new(ConversationId::General, &mut thread, "Which rule?"))
            .await
            .unwrap();

        assert_eq!(reply, "Rule 12 applies.");
        assert_eq!(thread, Some(ThreadHandle::new("thread_1")));
    }

    #[tokio::test]
    async fn test_existing_thread_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "other"})))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_9/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_9/runs"))
            .respond_with(run("completed"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_9/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let backend = backend_for(&server, 5);
        let mut thread = Some(ThreadHandle::new("thread_9"));
        let reply = backend
            .send(SendRequest::new(ConversationId::General, &mut thread, "again"))
            .await
            .unwrap();

        assert_eq!(reply, "");
        assert_eq!(thread, Some(ThreadHandle::new("thread_9")));
    }

    #[tokio::test]
    async fn test_new_thread_is_seeded_with_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "thread_1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/messages"))
            .and(body_partial_json(json!({
                "content": "The following document content is provided for context:\n\nSection 4"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "seed"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/messages"))
            .and(body_partial_json(json!({"content": "Summarise"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(run("completed"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"role": "assistant", "content": [{"type": "text", "text": {"value": "Summary"}}]}]
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server, 5);
        let mut thread = None;
        let mut request = SendRequest::new(ConversationId::Files, &mut thread, "Summarise");
        request.context = Some("Section 4");
        assert_eq!(backend.send(request).await.unwrap(), "Summary");
    }

    #[tokio::test]
    async fn test_failed_run_is_remote_job_failure() {
        let server = MockServer::start().await;
        mount_thread_and_messages(&server).await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(run("in_progress"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "run_1",
                "status": "failed",
                "last_error": {"code": "server_error", "message": "boom"}
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server, 5);
        let mut thread = None;
        let err = backend
            .send(SendRequest::new(ConversationId::General, &mut thread, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistError::RemoteJobFailed { ref status } if status == "failed"));
        // The thread survives a failed run.
        assert!(thread.is_some());
    }

    #[tokio::test]
    async fn test_poll_bound_yields_timeout() {
        let server = MockServer::start().await;
        mount_thread_and_messages(&server).await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(run("queued"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(run("in_progress"))
            .expect(3)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs/run_1/cancel"))
            .respond_with(run("cancelling"))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server, 3);
        let mut thread = None;
        let err = backend
            .send(SendRequest::new(ConversationId::General, &mut thread, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistError::RemoteJobTimedOut { attempts: 3 }));
        // The thread still has a live run, so it is not reused.
        assert!(thread.is_none());
    }

    #[tokio::test]
    async fn test_cancel_mid_poll_cancels_run_and_drops_thread() {
        let server = MockServer::start().await;
        mount_thread_and_messages(&server).await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(run("queued"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(run("in_progress"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs/run_1/cancel"))
            .respond_with(run("cancelling"))
            .expect(1)
            .mount(&server)
            .await;

        let (tx, rx) = watch::channel(false);
        let backend = backend_for(&server, 1000);
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            tx.send_replace(true);
            tx
        });

        let mut thread = None;
        let mut request = SendRequest::new(ConversationId::General, &mut thread, "hi");
        request.cancel = Some(rx);
        let err = backend.send(request).await.unwrap_err();
        assert!(matches!(err, AssistError::Cancelled));
        assert!(thread.is_none());
        drop(canceller.await.unwrap());
    }

    #[tokio::test]
    async fn test_run_cancel_rejection_still_reports_cancelled() {
        let server = MockServer::start().await;
        mount_thread_and_messages(&server).await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(run("queued"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs/run_1/cancel"))
            .respond_with(ResponseTemplate::new(400).set_body_string("already done"))
            .expect(1)
            .mount(&server)
            .await;

        let (_tx, rx) = watch::channel(true);
        let backend = backend_for(&server, 3);
        let mut thread = None;
        let mut request = SendRequest::new(ConversationId::General, &mut thread, "hi");
        request.cancel = Some(rx);
        let err = backend.send(request).await.unwrap_err();
        assert!(matches!(err, AssistError::Cancelled));
        assert!(thread.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_polling() {
        let server = MockServer::start().await;
        mount_thread_and_messages(&server).await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(run("queued"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(run("completed"))
            .expect(0)
            .mount(&server)
            .await;

        let (tx, rx) = watch::channel(true);
        let backend = backend_for(&server, 3);
        let mut thread = None;
        let mut request = SendRequest::new(ConversationId::General, &mut thread, "hi");
        request.cancel = Some(rx);
        let err = backend.send(request).await.unwrap_err();
        assert!(matches!(err, AssistError::Cancelled));
        drop(tx);
    }

    #[tokio::test]
    async fn test_http_error_is_remote_call_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let backend = backend_for(&server, 3);
        let mut thread = None;
        let err = backend
            .send(SendRequest::new(ConversationId::General, &mut thread, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistError::RemoteCallFailed(ref m) if m.contains("401")));
        assert!(thread.is_none());
    }
}
