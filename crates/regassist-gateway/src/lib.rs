//! Conversation Gateway.
//!
//! Uniform `send` over three kinds of LLM backend: a hosted assistant with
//! server-side threads and asynchronous runs, a stateless chat-completion
//! endpoint, and a multimodal endpoint that accepts the uploaded files
//! directly. Nothing here retries; callers surface the error and the user
//! resubmits.

pub mod backend;
mod http;
pub mod poll;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use regassist_core::config::AssistConfig;
use regassist_core::error::{AssistError, Result};
use regassist_core::types::{BackendKind, ChatMessage, ConversationId, ThreadHandle, UploadedFileSet};

pub use backend::{
    context_message, AssistantBackend, CompletionBackend, MultimodalBackend, CONTEXT_PREAMBLE,
};
pub use poll::{poll_until_done, PollPolicy, PollStep};

/// Everything a backend needs for one exchange.
///
/// `thread` is the slot's external handle; thread-based backends create it
/// on first use and leave it set afterwards. Stateless backends ignore it.
pub struct SendRequest<'a> {
    pub conversation: ConversationId,
    pub thread: &'a mut Option<ThreadHandle>,
    /// Extracted document text, if the conversation has any.
    pub context: Option<&'a str>,
    /// Prior turns, oldest first, excluding `message`.
    pub history: &'a [ChatMessage],
    pub files: Option<&'a UploadedFileSet>,
    pub message: &'a str,
    /// Flips to `true` when the caller asks to abandon the exchange.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl<'a> SendRequest<'a> {
    /// Minimal request: no context, history, files or cancellation.
    pub fn new(
        conversation: ConversationId,
        thread: &'a mut Option<ThreadHandle>,
        message: &'a str,
    ) -> Self {
        Self {
            conversation,
            thread,
            context: None,
            history: &[],
            files: None,
            message,
            cancel: None,
        }
    }
}

/// One LLM provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Send `request.message` and return the assistant's reply text.
    async fn send(&self, request: SendRequest<'_>) -> Result<String>;
}

/// Configured backends, keyed by kind.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn ChatBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every backend whose credentials are present.
    pub fn from_config(config: &AssistConfig) -> Result<Self> {
        let mut registry = Self::new();

        if config.assistant.is_configured() {
            registry.register(Arc::new(AssistantBackend::new(&config.assistant)?));
        }
        if config.completion.is_configured() {
            registry.register(Arc::new(CompletionBackend::new(&config.completion)?));
        }
        if config.multimodal.is_configured() {
            registry.register(Arc::new(MultimodalBackend::new(&config.multimodal)?));
        }

        info!(backends = ?registry.available(), "Chat backends configured");
        Ok(registry)
    }

    pub fn register(&mut self, backend: Arc<dyn ChatBackend>) {
        self.backends.insert(backend.kind(), backend);
    }

    pub fn with(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, kind: BackendKind) -> Result<Arc<dyn ChatBackend>> {
        self.backends.get(&kind).cloned().ok_or_else(|| {
            AssistError::BackendUnavailable(format!("{} backend is not configured", kind))
        })
    }

    /// Configured kinds in display order.
    pub fn available(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .iter()
            .copied()
            .filter(|k| self.backends.contains_key(k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(BackendKind);

    #[async_trait]
    impl ChatBackend for Echo {
        fn kind(&self) -> BackendKind {
            self.0
        }

        async fn send(&self, request: SendRequest<'_>) -> Result<String> {
            Ok(format!("{}: {}", self.0, request.message))
        }
    }

    #[test]
    fn test_empty_config_has_no_backends() {
        let registry = BackendRegistry::from_config(&AssistConfig::default()).unwrap();
        assert!(registry.available().is_empty());
        let err = registry.get(BackendKind::Assistant).err().unwrap();
        assert!(matches!(err, AssistError::BackendUnavailable(_)));
    }

    #[test]
    fn test_from_config_builds_configured_backends() {
        let mut config = AssistConfig::default();
        config.completion.api_key = "sk-test".to_string();
        config.multimodal.api_key = "gm-test".to_string();

        let registry = BackendRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.available(),
            vec![BackendKind::Completion, BackendKind::Multimodal]
        );
        assert!(registry.get(BackendKind::Assistant).is_err());
    }

    #[tokio::test]
    async fn test_registered_backend_is_dispatched() {
        let registry = BackendRegistry::new()
            .with(Arc::new(Echo(BackendKind::Completion)))
            .with(Arc::new(Echo(BackendKind::Multimodal)));

        let backend = registry.get(BackendKind::Multimodal).unwrap();
        let mut thread = None;
        let reply = backend
            .send(SendRequest::new(ConversationId::Files, &mut thread, "hi"))
            .await
            .unwrap();
        assert_eq!(reply, "multimodal: hi");
    }
}
