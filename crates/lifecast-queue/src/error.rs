//! Error types for the event queue.
//!
//! [`QueueError`] covers the queue's own operations. The reasons a
//! subscription stops are reported separately as
//! [`SubscriptionEnd`](crate::subscription::SubscriptionEnd).

use std::path::PathBuf;

/// Errors that can occur in the event queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The storage directory could not be created.
    #[error("failed to create queue storage at {}: {source}", path.display())]
    Create {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing a step record failed.
    #[error("failed to write step {step}: {source}")]
    Write {
        /// Step being written.
        step: u64,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Reading a step record failed for a reason other than absence.
    #[error("failed to read step {step}: {source}")]
    Read {
        /// Step being read.
        step: u64,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// No record is stored for the step, either never written or trimmed.
    #[error("step {step} not found")]
    NotFound {
        /// Step that was requested.
        step: u64,
    },

    /// A record already exists for the step. Records are immutable.
    #[error("step {step} already stored")]
    StepExists {
        /// Step that was pushed twice.
        step: u64,
    },

    /// Removing the storage directory failed.
    #[error("failed to delete queue storage at {}: {source}", path.display())]
    Delete {
        /// Directory that could not be removed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl QueueError {
    /// Whether this error means the record is absent.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
