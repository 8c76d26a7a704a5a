//! Session Store.
//!
//! Each authenticated user owns one [`Session`]: an explicit
//! [`SessionContext`] behind an async mutex, plus a cancellation channel
//! that lives outside the mutex so an in-flight exchange can be interrupted
//! while it holds the lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

use regassist_core::types::{
    Conversation, ConversationId, ExtractedText, ThreadHandle, UploadedFile, UploadedFileSet,
};

// =============================================================================
// SessionContext
// =============================================================================

/// One logical conversation and its provider-side thread.
#[derive(Debug, Default, Clone)]
pub struct ChatSlot {
    pub conversation: Conversation,
    pub thread: Option<ThreadHandle>,
}

impl ChatSlot {
    /// Drop every message and the thread handle.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.thread = None;
    }
}

/// Which conversations a clear request targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearScope {
    General,
    Files,
    #[default]
    All,
}

/// All mutable state of one user session.
#[derive(Debug, Default)]
pub struct SessionContext {
    pub general: ChatSlot,
    pub file_chat: ChatSlot,
    pub uploads: Option<UploadedFileSet>,
    pub extracted: Option<ExtractedText>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, id: ConversationId) -> &ChatSlot {
        match id {
            ConversationId::General => &self.general,
            ConversationId::Files => &self.file_chat,
        }
    }

    pub fn slot_mut(&mut self, id: ConversationId) -> &mut ChatSlot {
        match id {
            ConversationId::General => &mut self.general,
            ConversationId::Files => &mut self.file_chat,
        }
    }

    /// True when `files` differs from the current set by ordered filename list.
    pub fn is_new_upload(&self, files: &[UploadedFile]) -> bool {
        match &self.uploads {
            Some(current) => !current.same_filenames(files),
            None => true,
        }
    }

    /// Install a new upload set and its extracted text.
    ///
    /// The file chat is reset first: its thread was seeded with the previous
    /// documents and must not be reused.
    pub fn replace_uploads(&mut self, set: UploadedFileSet, extracted: ExtractedText) {
        self.file_chat.reset();
        self.uploads = Some(set);
        self.extracted = Some(extracted);
    }

    /// Clear conversations according to `scope`.
    ///
    /// `Files` keeps the uploaded documents so the file chat can restart
    /// against them; `All` also forgets the uploads.
    pub fn clear(&mut self, scope: ClearScope) {
        match scope {
            ClearScope::General => self.general.reset(),
            ClearScope::Files => self.file_chat.reset(),
            ClearScope::All => {
                self.general.reset();
                self.file_chat.reset();
                self.uploads = None;
                self.extracted = None;
            }
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// A logged-in user's session.
pub struct Session {
    token: String,
    context: Mutex<SessionContext>,
    cancel: watch::Sender<bool>,
    last_active: AtomicI64,
}

impl Session {
    fn new(token: String) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            token,
            context: Mutex::new(SessionContext::new()),
            cancel,
            last_active: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Lock the session context. Requests of one session serialize here.
    pub async fn lock(&self) -> MutexGuard<'_, SessionContext> {
        self.context.lock().await
    }

    /// Lock the context for one exchange, then reset the cancellation flag
    /// and hand out a receiver for it.
    ///
    /// The flag is only reset by the request that owns the lock, so a
    /// request queued behind a running exchange cannot swallow a cancel
    /// meant for that exchange.
    pub async fn begin_exchange(&self) -> (MutexGuard<'_, SessionContext>, watch::Receiver<bool>) {
        let guard = self.context.lock().await;
        self.cancel.send_replace(false);
        (guard, self.cancel.subscribe())
    }

    /// Ask the in-flight exchange, if any, to stop.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
        debug!("Cancellation requested");
    }

    pub fn last_active(&self) -> i64 {
        self.last_active.load(Ordering::Relaxed)
    }

    fn touch(&self, now: i64) {
        self.last_active.store(now, Ordering::Relaxed);
    }
}

// =============================================================================
// SessionStore
// =============================================================================

/// Token-keyed registry of live sessions with idle expiry.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    timeout_secs: i64,
}

impl SessionStore {
    pub fn new(session_timeout_minutes: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout_secs: i64::try_from(session_timeout_minutes.saturating_mul(60))
                .unwrap_or(i64::MAX),
        }
    }

    fn is_expired(&self, session: &Session, now: i64) -> bool {
        now - session.last_active() > self.timeout_secs
    }

    /// Register a new session under `token`.
    pub async fn create(&self, token: String) -> Arc<Session> {
        let session = Arc::new(Session::new(token.clone()));
        let evicted = self.evict_expired().await;
        let mut sessions = self.sessions.write().await;
        sessions.insert(token, Arc::clone(&session));
        info!(active = sessions.len(), evicted, "Session created");
        session
    }

    /// Look up a live session, refreshing its idle timer. Expired sessions
    /// are removed and reported as absent.
    pub async fn get(&self, token: &str) -> Option<Arc<Session>> {
        let now = Utc::now().timestamp();
        let session = self.sessions.read().await.get(token).cloned()?;

        if self.is_expired(&session, now) {
            self.sessions.write().await.remove(token);
            info!("Session expired");
            return None;
        }
        session.touch(now);
        Some(session)
    }

    /// Drop a session. Returns whether it existed.
    pub async fn remove(&self, token: &str) -> bool {
        let removed = self.sessions.write().await.remove(token);
        if let Some(session) = &removed {
            session.cancel();
        }
        removed.is_some()
    }

    /// Remove every idle session. Returns how many were dropped.
    pub async fn evict_expired(&self) -> usize {
        let now = Utc::now().timestamp();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !self.is_expired(s, now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use regassist_core::types::{ChatMessage, PDF_MEDIA_TYPE};

    fn file(name: &str) -> UploadedFile {
        UploadedFile::new(name, vec![1, 2, 3], PDF_MEDIA_TYPE)
    }

    fn extracted(set: &UploadedFileSet, text: &str) -> ExtractedText {
        ExtractedText {
            source_set: set.id,
            text: text.to_string(),
        }
    }

    fn populated() -> SessionContext {
        let mut ctx = SessionContext::new();
        ctx.general.conversation.push(ChatMessage::user("hi"));
        ctx.general.thread = Some(ThreadHandle::new("thread_g"));

        let set = UploadedFileSet::new(vec![file("a.pdf")]);
        let text = extracted(&set, "doc text");
        ctx.replace_uploads(set, text);
        ctx.file_chat.conversation.push(ChatMessage::user("what?"));
        ctx.file_chat.thread = Some(ThreadHandle::new("thread_f"));
        ctx
    }

    // ---- Upload invalidation ----

    #[test]
    fn test_first_upload_is_new() {
        let ctx = SessionContext::new();
        assert!(ctx.is_new_upload(&[file("a.pdf")]));
    }

    #[test]
    fn test_same_filenames_are_not_new() {
        let ctx = populated();
        assert!(!ctx.is_new_upload(&[file("a.pdf")]));
    }

    #[test]
    fn test_changed_or_reordered_filenames_are_new() {
        let ctx = populated();
        assert!(ctx.is_new_upload(&[file("b.pdf")]));
        assert!(ctx.is_new_upload(&[file("a.pdf"), file("b.pdf")]));
    }

    #[test]
    fn test_replace_uploads_invalidates_file_chat_only() {
        let mut ctx = populated();
        let set = UploadedFileSet::new(vec![file("b.pdf")]);
        let new_id = set.id;
        let text = extracted(&set, "new text");
        ctx.replace_uploads(set, text);

        assert!(ctx.file_chat.thread.is_none());
        assert!(ctx.file_chat.conversation.is_empty());
        assert_eq!(ctx.extracted.as_ref().unwrap().source_set, new_id);
        assert_eq!(ctx.extracted.as_ref().unwrap().text, "new text");
        // General chat is untouched.
        assert_eq!(ctx.general.conversation.len(), 1);
        assert!(ctx.general.thread.is_some());
    }

    // ---- Clear ----

    #[test]
    fn test_clear_general() {
        let mut ctx = populated();
        ctx.clear(ClearScope::General);
        assert!(ctx.general.conversation.is_empty());
        assert!(ctx.general.thread.is_none());
        assert!(ctx.file_chat.thread.is_some());
    }

    #[test]
    fn test_clear_files_keeps_uploads() {
        let mut ctx = populated();
        ctx.clear(ClearScope::Files);
        assert!(ctx.file_chat.conversation.is_empty());
        assert!(ctx.file_chat.thread.is_none());
        assert!(ctx.uploads.is_some());
        assert!(ctx.extracted.is_some());
        assert_eq!(ctx.general.conversation.len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let mut ctx = populated();
        ctx.clear(ClearScope::All);
        assert!(ctx.general.conversation.is_empty());
        assert!(ctx.general.thread.is_none());
        assert!(ctx.file_chat.conversation.is_empty());
        assert!(ctx.file_chat.thread.is_none());
        assert!(ctx.uploads.is_none());
        assert!(ctx.extracted.is_none());
    }

    #[test]
    fn test_slot_lookup() {
        let mut ctx = populated();
        assert_eq!(ctx.slot(ConversationId::General).conversation.len(), 1);
        ctx.slot_mut(ConversationId::Files).reset();
        assert!(ctx.slot(ConversationId::Files).thread.is_none());
    }

    #[test]
    fn test_clear_scope_serde() {
        let scope: ClearScope = serde_json::from_str("\"files\"").unwrap();
        assert_eq!(scope, ClearScope::Files);
        assert_eq!(ClearScope::default(), ClearScope::All);
    }

    // ---- Store ----

    #[tokio::test]
    async fn test_store_create_get_remove() {
        let store = SessionStore::new(480);
        let session = store.create("abc".to_string()).await;
        assert_eq!(session.token(), "abc");
        assert_eq!(store.len().await, 1);

        let found = store.get("abc").await.unwrap();
        assert!(Arc::ptr_eq(&session, &found));
        assert!(store.get("missing").await.is_none());

        assert!(store.remove("abc").await);
        assert!(!store.remove("abc").await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_idle_session_is_evicted_on_lookup() {
        let store = SessionStore::new(1);
        let session = store.create("old".to_string()).await;
        session.touch(Utc::now().timestamp() - 120);

        assert!(store.get("old").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_evict_expired_keeps_active_sessions() {
        let store = SessionStore::new(1);
        let stale = store.create("stale".to_string()).await;
        store.create("fresh".to_string()).await;
        stale.touch(Utc::now().timestamp() - 120);

        assert_eq!(store.evict_expired().await, 1);
        assert!(store.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new(480);
        let a = store.create("a".to_string()).await;
        let b = store.create("b".to_string()).await;

        a.lock().await.general.conversation.push(ChatMessage::user("only a"));
        assert_eq!(a.lock().await.general.conversation.len(), 1);
        assert!(b.lock().await.general.conversation.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_signal() {
        let store = SessionStore::new(480);
        let session = store.create("t".to_string()).await;

        let (guard, rx) = session.begin_exchange().await;
        assert!(!*rx.borrow());
        session.cancel();
        assert!(*rx.borrow());
        drop(guard);

        // A new exchange starts uncancelled.
        let (_guard, rx) = session.begin_exchange().await;
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn test_queued_exchange_keeps_pending_cancel() {
        let store = SessionStore::new(480);
        let session = store.create("t".to_string()).await;

        let (guard, running) = session.begin_exchange().await;
        let queued = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                let (_guard, rx) = session.begin_exchange().await;
                let value = *rx.borrow();
                value
            })
        };
        tokio::task::yield_now().await;

        session.cancel();
        tokio::task::yield_now().await;
        assert!(*running.borrow());

        drop(guard);
        // The queued exchange starts fresh once it owns the lock.
        assert!(!queued.await.unwrap());
        assert!(!*running.borrow());
    }
}
