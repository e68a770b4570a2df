//! Durable, replayable event log for lifecast.
//!
//! Producers append one opaque event per step with
//! [`EventQueue::push_step`]. Any number of subscribers replay the log
//! forward from a step of their choosing, each at its own pace, and sleep
//! while caught up. Records older than the retention window are trimmed in
//! the background.
//!
//! ```text
//! engine callback --> push_step(step, bytes) --> <dir>/<step>.evt
//!                          |
//!                          +--> high-water mark (watch) --> Subscription::next_event
//! ```
//!
//! # Modules
//!
//! - [`queue`] -- [`EventQueue`] storage, high-water mark, retention
//! - [`subscription`] -- per-subscriber replay state machine
//! - [`cancel`] -- [`Cancellation`] signal used to end subscriptions
//! - [`error`] -- Shared error types

pub mod cancel;
pub mod error;
pub mod queue;
pub mod subscription;

// Re-export primary types for convenience.
pub use cancel::Cancellation;
pub use error::QueueError;
pub use queue::{EventQueue, DEFAULT_RETENTION};
pub use subscription::{Subscription, SubscriptionEnd, SubscriptionState};
