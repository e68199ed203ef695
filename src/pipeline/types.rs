use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use crate::validation::{SystemGenerationResult, ValidationLevel};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation token. Steps poll [`CancelToken::is_cancelled`];
/// in-flight collaborator calls race against [`CancelToken::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<CancelState>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Release);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.0.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// What a healing pass is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealTarget {
    Component(String),
    Blueprint(String),
}

impl fmt::Display for HealTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealTarget::Component(name) => write!(f, "component {name}"),
            HealTarget::Blueprint(name) => write!(f, "blueprint {name}"),
        }
    }
}

/// Progress of one generation run. The last event is always `Completed`.
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    PreflightStarted,
    PreflightFinished {
        available: usize,
        missing: usize,
    },
    TierStarted(ValidationLevel),
    TierFinished {
        level: ValidationLevel,
        passed: bool,
    },
    HealingStarted {
        level: ValidationLevel,
        target: HealTarget,
    },
    HealingFinished {
        level: ValidationLevel,
        target: HealTarget,
        successful: bool,
    },
    Finalizing,
    Completed(Box<SystemGenerationResult>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_shared_across_clones_and_idempotent() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_for_waiters_and_late_callers() {
        let token = CancelToken::new();
        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });
        tokio::task::yield_now().await;
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
        // Already cancelled: returns immediately.
        tokio::time::timeout(std::time::Duration::from_secs(1), token.cancelled())
            .await
            .expect("late caller returned");
    }

    #[test]
    fn heal_target_display() {
        assert_eq!(HealTarget::Component("X".into()).to_string(), "component X");
        assert_eq!(HealTarget::Blueprint("bp".into()).to_string(), "blueprint bp");
    }
}
