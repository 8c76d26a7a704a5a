//! Chat orchestration for the regulatory assistant.
//!
//! Owns per-session state (two conversations, their provider threads and the
//! current upload set) and enforces the invalidation rules that tie them
//! together before handing each exchange to the Conversation Gateway.

pub mod error;
pub mod orchestrator;
pub mod session;

pub use error::ChatError;
pub use orchestrator::{ChatOrchestrator, UploadOutcome, MAX_MESSAGE_LENGTH};
pub use session::{ChatSlot, ClearScope, Session, SessionContext, SessionStore};
