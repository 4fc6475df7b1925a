//! Cooperative cancellation for long-running cycles.
//!
//! Cycles block on navigation waits, scroll pauses, and retry backoff.
//! Each of those suspension points races against [`CancelFlag::cancelled`]
//! so an external signal tears the cycle down through the same resource
//! release path as normal completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A cancellation signal shared between a cycle and its owner.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Clone, Default)]
pub struct CancelFlag {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation is signalled. Safe to call after the
    /// fact: an already-cancelled flag resolves immediately.
    pub async fn cancelled(&self) {
        let mut notified = std::pin::pin!(self.inner.notify.notified());
        // Register before re-checking the flag: notify_waiters only
        // wakes already-registered waiters.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Sleep that ends early on cancellation. Returns false if the wait
    /// was interrupted.
    pub async fn sleep(&self, duration: std::time::Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancelled() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let flag = CancelFlag::new();
        let waiter = flag.clone();
        let handle = tokio::spawn(async move { waiter.sleep(Duration::from_secs(60)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        flag.cancel();

        let completed = handle.await.unwrap();
        assert!(!completed);
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled_resolves_immediately() {
        let flag = CancelFlag::new();
        flag.cancel();
        // Must not hang.
        flag.cancelled().await;
        assert!(!flag.sleep(Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_uncancelled_sleep_completes() {
        let flag = CancelFlag::new();
        assert!(flag.sleep(Duration::from_millis(5)).await);
    }
}
