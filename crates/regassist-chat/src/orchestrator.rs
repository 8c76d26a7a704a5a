//! Chat orchestrator: validates input, applies the session's invalidation
//! rules and routes each exchange to the selected backend.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use regassist_core::error::AssistError;
use regassist_core::types::{
    BackendKind, ChatMessage, ConversationId, UploadedFile, UploadedFileSet,
};
use regassist_extract::TextExtractor;
use regassist_gateway::{BackendRegistry, SendRequest};

use crate::error::ChatError;
use crate::session::{ClearScope, Session, SessionContext};

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 8000;

/// Result of an upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    /// False when the filenames matched the current set and nothing changed.
    pub replaced: bool,
    pub files: Vec<String>,
    pub extracted_chars: usize,
}

/// Central coordinator between sessions, the extractor and the backends.
pub struct ChatOrchestrator {
    extractor: Arc<dyn TextExtractor>,
    backends: BackendRegistry,
}

impl ChatOrchestrator {
    pub fn new(extractor: Arc<dyn TextExtractor>, backends: BackendRegistry) -> Self {
        Self {
            extractor,
            backends,
        }
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn extractor(&self) -> &Arc<dyn TextExtractor> {
        &self.extractor
    }

    /// Send a message in the general conversation (hosted assistant, no
    /// document context).
    pub async fn send_general(&self, session: &Session, message: &str) -> Result<String, ChatError> {
        self.exchange(session, ConversationId::General, BackendKind::Assistant, message)
            .await
    }

    /// Send a message about the uploaded documents through `backend`.
    pub async fn send_files(
        &self,
        session: &Session,
        message: &str,
        backend: BackendKind,
    ) -> Result<String, ChatError> {
        self.exchange(session, ConversationId::Files, backend, message)
            .await
    }

    /// Install an uploaded file set.
    ///
    /// A set with the same ordered filenames as the current one is ignored.
    /// Otherwise the text is extracted first and the session is only
    /// modified once extraction succeeds.
    pub async fn upload(
        &self,
        session: &Session,
        files: Vec<UploadedFile>,
    ) -> Result<UploadOutcome, ChatError> {
        if files.is_empty() {
            return Err(ChatError::EmptyUpload);
        }
        if let Some(bad) = files.iter().find(|f| f.kind().is_none()) {
            return Err(AssistError::UnsupportedDocument(bad.filename.clone()).into());
        }

        let mut ctx = session.lock().await;
        if !ctx.is_new_upload(&files) {
            debug!("Upload matches current file set, keeping conversation");
            return Ok(UploadOutcome {
                replaced: false,
                files: files.iter().map(|f| f.filename.clone()).collect(),
                extracted_chars: ctx.extracted.as_ref().map_or(0, |e| e.char_count()),
            });
        }

        let set = UploadedFileSet::new(files);
        let extracted = self.extractor.extract_set(&set).await.map_err(|e| {
            warn!(error = %e, "Extraction of uploaded files failed");
            e
        })?;

        let outcome = UploadOutcome {
            replaced: true,
            files: set.filenames().into_iter().map(String::from).collect(),
            extracted_chars: extracted.char_count(),
        };
        info!(
            files = outcome.files.len(),
            bytes = set.total_bytes(),
            chars = outcome.extracted_chars,
            "File set replaced"
        );
        ctx.replace_uploads(set, extracted);
        Ok(outcome)
    }

    pub async fn clear(&self, session: &Session, scope: ClearScope) {
        session.lock().await.clear(scope);
        info!(scope = ?scope, "Conversation cleared");
    }

    pub async fn history(&self, session: &Session, conversation: ConversationId) -> Vec<ChatMessage> {
        session
            .lock()
            .await
            .slot(conversation)
            .conversation
            .messages()
            .to_vec()
    }

    /// Plain-text transcript of one conversation.
    pub async fn export(&self, session: &Session, conversation: ConversationId) -> String {
        session
            .lock()
            .await
            .slot(conversation)
            .conversation
            .export_transcript()
    }

    async fn exchange(
        &self,
        session: &Session,
        conversation: ConversationId,
        kind: BackendKind,
        message: &str,
    ) -> Result<String, ChatError> {
        let message = validate_message(message)?;
        let backend = self.backends.get(kind)?;
        let (mut guard, cancel) = session.begin_exchange().await;
        let ctx: &mut SessionContext = &mut guard;

        let (slot, context, files) = match conversation {
            ConversationId::General => (&mut ctx.general, None, None),
            ConversationId::Files => {
                let uploads = ctx.uploads.as_ref().ok_or(ChatError::NoDocument)?;
                let context = ctx
                    .extracted
                    .as_ref()
                    .filter(|_| kind.needs_extracted_text())
                    .map(|e| e.text.as_str());
                (&mut ctx.file_chat, context, Some(uploads))
            }
        };

        let request = SendRequest {
            conversation,
            thread: &mut slot.thread,
            context,
            history: slot.conversation.messages(),
            files,
            message,
            cancel: Some(cancel),
        };

        let reply = match backend.send(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(conversation = ?conversation, backend = %kind, error = %e, "Exchange failed");
                return Err(e.into());
            }
        };

        slot.conversation.push(ChatMessage::user(message));
        slot.conversation.push(ChatMessage::assistant(reply.clone()));
        debug!(conversation = ?conversation, backend = %kind, turns = slot.conversation.len(), "Exchange completed");
        Ok(reply)
    }
}

/// Trim `message` and check it against the length bound.
pub fn validate_message(message: &str) -> Result<&str, ChatError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
    }
    Ok(trimmed)
}

// =============================================================================
// Tests
// =============================================================================
