//! Provider clients implementing [`ChatBackend`](crate::ChatBackend).

mod assistant;
mod completion;
mod multimodal;

pub use assistant::AssistantBackend;
pub use completion::CompletionBackend;
pub use multimodal::MultimodalBackend;

/// Prefix of the synthetic first message that hands extracted document
/// text to a thread-based assistant.
pub const CONTEXT_PREAMBLE: &str = "The following document content is provided for context:";

/// Build the context-seeding message for `text`.
pub fn context_message(text: &str) -> String {
    format!("{}\n\n{}", CONTEXT_PREAMBLE, text)
}
