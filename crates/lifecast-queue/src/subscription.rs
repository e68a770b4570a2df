//! Ordered replay of the event log for one subscriber.
//!
//! A [`Subscription`] is a small state machine:
//!
//! ```text
//!   CatchingUp  --(high-water mark < next step)-->  Waiting
//!   Waiting     --(push reaches next step)------->  CatchingUp
//!   any         --(cancelled | missing | I/O)---->  Terminated
//! ```
//!
//! Waiting uses [`watch::Receiver::wait_for`], which checks the current
//! mark and registers for changes without a gap, so a push that lands
//! between the check and the wait is never missed.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::watch;
use tracing::debug;

use crate::cancel::Cancellation;
use crate::error::QueueError;
use crate::queue::QueueShared;

/// Where a subscription is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// The next step is stored (or about to be checked); reading ahead.
    CatchingUp,
    /// Caught up; sleeping until a push or cancellation.
    Waiting,
    /// Ended. Every further read returns the same [`SubscriptionEnd`].
    Terminated,
}

/// Why a subscription ended.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubscriptionEnd {
    /// The cancellation signal fired.
    #[error("subscription cancelled")]
    Cancelled,

    /// The next record is gone, usually trimmed by retention before the
    /// subscriber reached it. The subscriber must resynchronize.
    #[error("step {step} is no longer stored; subscriber fell behind")]
    FellBehind {
        /// The step that could not be found.
        step: u64,
    },

    /// Reading the next record failed.
    #[error("storage failure at step {step}: {source}")]
    Storage {
        /// The step being read.
        step: u64,
        /// The underlying queue error.
        source: Arc<QueueError>,
    },
}

impl SubscriptionEnd {
    /// Whether the end was requested rather than caused by a failure.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A lazily read, unbounded, ordered sequence of event payloads.
#[derive(Debug)]
pub struct Subscription {
    shared: Arc<QueueShared>,
    high_water: watch::Receiver<u64>,
    cancel: Cancellation,
    next_step: u64,
    state: SubscriptionState,
    end: Option<SubscriptionEnd>,
}

impl Subscription {
    pub(crate) fn new(shared: Arc<QueueShared>, cancel: Cancellation, start_step: u64) -> Self {
        let high_water = shared.subscribe_high_water();
        Self {
            shared,
            high_water,
            cancel,
            next_step: start_step.saturating_add(1),
            state: SubscriptionState::CatchingUp,
            end: None,
        }
    }

    /// The step whose record will be yielded next.
    pub const fn next_step(&self) -> u64 {
        self.next_step
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Wait for and return the next event payload.
    ///
    /// # Errors
    ///
    /// Returns the [`SubscriptionEnd`] that terminated the subscription.
    /// Once terminated, every call returns the same value without touching
    /// storage.
    pub async fn next_event(&mut self) -> Result<Vec<u8>, SubscriptionEnd> {
        if let Some(end) = &self.end {
            return Err(end.clone());
        }

        match self.read_next().await {
            Ok(event) => Ok(event),
            Err(end) => {
                debug!(next_step = self.next_step, reason = %end, "subscription terminated");
                self.state = SubscriptionState::Terminated;
                self.end = Some(end.clone());
                Err(end)
            }
        }
    }

    async fn read_next(&mut self) -> Result<Vec<u8>, SubscriptionEnd> {
        if self.cancel.is_cancelled() {
            return Err(SubscriptionEnd::Cancelled);
        }

        let step = self.next_step;
        if *self.high_water.borrow() < step {
            self.state = SubscriptionState::Waiting;
            let woke = tokio::select! {
                biased;
                () = self.cancel.cancelled() => false,
                reached = self.high_water.wait_for(|high_water| *high_water >= step) => reached.is_ok(),
            };
            if !woke {
                // The sender lives as long as `shared`, which this
                // subscription owns, so only cancellation gets here.
                return Err(SubscriptionEnd::Cancelled);
            }
            self.state = SubscriptionState::CatchingUp;
        }

        match self.shared.read(step).await {
            Ok(event) => {
                self.next_step = step.saturating_add(1);
                Ok(event)
            }
            Err(QueueError::NotFound { step }) => Err(SubscriptionEnd::FellBehind { step }),
            Err(other) => Err(SubscriptionEnd::Storage {
                step,
                source: Arc::new(other),
            }),
        }
    }

    /// Adapt into a [`Stream`].
    ///
    /// The stream yields `Ok(payload)` per step, then exactly one `Err`
    /// carrying the termination reason, then ends.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<u8>, SubscriptionEnd>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut subscription = state?;
            match subscription.next_event().await {
                Ok(event) => Some((Ok(event), Some(subscription))),
                Err(end) => Some((Err(end), None)),
            }
        })
    }
}
