//! Cancellation signal shared between a subscriber and its owner.
//!
//! A [`Cancellation`] is a cloneable flag plus a wakeup. Firing it wakes
//! every task currently awaiting [`Cancellation::cancelled`] immediately,
//! and every later check observes the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cloneable, one-shot cancellation signal.
///
/// All clones share the same state. Cancelling is permanent.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    inner: Arc<CancelInner>,
}

impl Cancellation {
    /// Create a signal that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal and wake every waiter. Repeated calls do nothing.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn cancelled(&self) {
        loop {
            let mut notified = std::pin::pin!(self.inner.notify.notified());
            // Register before checking the flag so a concurrent cancel()
            // cannot slip between the check and the wait.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn starts_uncancelled() {
        let cancel = Cancellation::new();
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let cancel = Cancellation::new();
        let other = cancel.clone();
        other.cancel();
        other.cancel();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let cancel = Cancellation::new();
        cancel.cancel();
        let waited = tokio::time::timeout(Duration::from_millis(50), cancel.cancelled()).await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn cancel_wakes_all_waiters() {
        let cancel = Cancellation::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let cancel = cancel.clone();
                tokio::spawn(async move { cancel.cancelled().await })
            })
            .collect();

        tokio::task::yield_now().await;
        cancel.cancel();

        for waiter in waiters {
            let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
            assert!(matches!(joined, Ok(Ok(()))));
        }
    }
}
