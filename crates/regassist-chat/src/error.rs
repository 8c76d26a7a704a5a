//! Error types for chat orchestration.

use regassist_core::error::AssistError;

/// Errors from the chat layer.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("no document has been uploaded")]
    NoDocument,
    #[error("upload contains no files")]
    EmptyUpload,
    #[error(transparent)]
    Assist(#[from] AssistError),
}
