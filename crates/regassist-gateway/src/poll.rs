//! Bounded, cancellable polling of long-running remote jobs.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use regassist_core::config::AssistantConfig;
use regassist_core::error::{AssistError, Result};

/// Fixed-interval polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 300,
        }
    }
}

impl From<&AssistantConfig> for PollPolicy {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: config.max_poll_attempts,
        }
    }
}

/// Result of a single status check.
#[derive(Debug)]
pub enum PollStep<T> {
    Done(T),
    Pending,
}

/// Sleep `policy.interval`, run `check`, and repeat until it reports
/// `Done`, the attempt budget is spent, or `cancel` flips to `true`.
///
/// `check` receives the 1-based attempt number.
pub async fn poll_until_done<T, F, Fut>(
    policy: PollPolicy,
    mut cancel: Option<watch::Receiver<bool>>,
    mut check: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStep<T>>>,
{
    for attempt in 1..=policy.max_attempts {
        sleep_or_cancel(policy.interval, cancel.as_mut()).await?;
        if let PollStep::Done(value) = check(attempt).await? {
            return Ok(value);
        }
    }
    Err(AssistError::RemoteJobTimedOut {
        attempts: policy.max_attempts,
    })
}

async fn sleep_or_cancel(
    interval: Duration,
    cancel: Option<&mut watch::Receiver<bool>>,
) -> Result<()> {
    let Some(rx) = cancel else {
        tokio::time::sleep(interval).await;
        return Ok(());
    };

    if *rx.borrow_and_update() {
        return Err(AssistError::Cancelled);
    }

    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return Ok(()),
            changed = rx.changed() => {
                if changed.is_err() {
                    // Sender gone: nobody can cancel any more.
                    (&mut sleep).await;
                    return Ok(());
                }
                if *rx.borrow_and_update() {
                    return Err(AssistError::Cancelled);
                }
            }
        }
    }
}
