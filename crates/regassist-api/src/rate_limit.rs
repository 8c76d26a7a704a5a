//! Per-session request limiter.
//!
//! Each session token gets a fixed one-second window; requests beyond
//! `max_per_sec` inside the window are answered with 429. Runs after
//! [`crate::auth::require_session`], so every request it sees carries a
//! session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Extension, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

use regassist_chat::Session;

/// Windows are pruned once the table holds this many tokens.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    second: u64,
    used: u64,
}

/// Fixed-window limiter keyed by session token.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_sec: u64,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(max_per_sec: u64) -> Self {
        Self {
            max_per_sec,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request for `key` at epoch second `now`.
    pub fn try_acquire_at(&self, key: &str, now: u64) -> bool {
        if self.max_per_sec == 0 {
            return false;
        }
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() >= PRUNE_THRESHOLD {
            windows.retain(|_, w| w.second >= now);
        }

        let window = windows
            .entry(key.to_string())
            .or_insert(Window { second: now, used: 0 });
        if window.second != now {
            *window = Window { second: now, used: 0 };
        }
        if window.used >= self.max_per_sec {
            return false;
        }
        window.used += 1;
        true
    }

    pub fn try_acquire(&self, key: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.try_acquire_at(key, now)
    }

    /// Number of tokens currently tracked.
    pub fn tracked(&self) -> usize {
        match self.windows.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Axum middleware that enforces the limit for the caller's session.
pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    Extension(session): Extension<Arc<Session>>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.try_acquire(session.token()) {
        return next.run(req).await;
    }
    debug!(path = %req.uri().path(), "Session exceeded request rate");
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "too_many_requests",
            "message": "Too many requests, slow down"
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_within_one_second() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.try_acquire_at("a", 100));
        assert!(limiter.try_acquire_at("a", 100));
        assert!(limiter.try_acquire_at("a", 100));
        assert!(!limiter.try_acquire_at("a", 100));
    }

    #[test]
    fn test_sessions_are_limited_independently() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire_at("a", 100));
        assert!(!limiter.try_acquire_at("a", 100));
        assert!(limiter.try_acquire_at("b", 100));
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_next_second_resets() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire_at("a", 100));
        assert!(!limiter.try_acquire_at("a", 100));
        assert!(limiter.try_acquire_at("a", 101));
    }

    #[test]
    fn test_zero_limit_rejects_everything() {
        let limiter = RateLimiter::new(0);
        assert!(!limiter.try_acquire_at("a", 100));
    }

    #[test]
    fn test_stale_windows_pruned() {
        let limiter = RateLimiter::new(5);
        for i in 0..PRUNE_THRESHOLD {
            assert!(limiter.try_acquire_at(&format!("t{i}"), 100));
        }
        assert!(limiter.try_acquire_at("fresh", 200));
        assert_eq!(limiter.tracked(), 1);
    }
}
