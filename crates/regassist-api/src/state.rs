//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use regassist_chat::{ChatOrchestrator, SessionStore};
use regassist_core::config::AssistConfig;
use regassist_directory::DirectoryClient;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. Per-user
/// mutable state lives in the session store.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed at startup.
    pub config: Arc<AssistConfig>,
    /// Live login sessions.
    pub sessions: Arc<SessionStore>,
    /// Extraction and backend routing.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Remote reference-document repository.
    pub directory: Arc<DirectoryClient>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: AssistConfig,
        orchestrator: ChatOrchestrator,
        directory: DirectoryClient,
    ) -> Self {
        let sessions = SessionStore::new(config.auth.session_timeout_minutes);
        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            orchestrator: Arc::new(orchestrator),
            directory: Arc::new(directory),
            start_time: Instant::now(),
        }
    }
}
