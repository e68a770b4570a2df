//! Step-indexed, file-backed event log.
//!
//! Each pushed event is stored as its own file named after the step
//! number inside a storage directory private to the queue. The highest
//! stored step (the high-water mark) lives in a [`watch`] channel; every
//! subscriber holds a receiver and sleeps on it while caught up.
//!
//! # Retention
//!
//! Every successful push spawns a best-effort task that deletes the record
//! `retention` steps behind it. Trim failures are logged and otherwise
//! ignored; they never fail the push.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cancel::Cancellation;
use crate::error::QueueError;
use crate::subscription::Subscription;

/// Number of most recent steps kept available for replay.
pub const DEFAULT_RETENTION: u64 = 1000;

/// File extension for step records.
const STEP_FILE_EXTENSION: &str = "evt";

/// State shared between the queue and its subscriptions.
#[derive(Debug)]
pub(crate) struct QueueShared {
    dir: PathBuf,
    high_water: watch::Sender<u64>,
    retention: u64,
}

impl QueueShared {
    fn step_path(&self, step: u64) -> PathBuf {
        self.dir.join(format!("{step}.{STEP_FILE_EXTENSION}"))
    }

    pub(crate) fn subscribe_high_water(&self) -> watch::Receiver<u64> {
        self.high_water.subscribe()
    }

    pub(crate) async fn read(&self, step: u64) -> Result<Vec<u8>, QueueError> {
        fs::read(self.step_path(step)).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                QueueError::NotFound { step }
            } else {
                QueueError::Read { step, source }
            }
        })
    }
}

/// Durable, replayable log of per-step events.
///
/// Cloning is cheap; clones share storage and the high-water mark.
#[derive(Debug, Clone)]
pub struct EventQueue {
    shared: Arc<QueueShared>,
}

impl EventQueue {
    /// Create a queue with the default retention window.
    ///
    /// Storage is a fresh `queue-<uuid>` directory under `base`, or under
    /// the system temp directory when `base` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Create`] if the directory cannot be created.
    pub async fn create(base: Option<&Path>) -> Result<Self, QueueError> {
        Self::with_retention(base, DEFAULT_RETENTION).await
    }

    /// Create a queue that keeps the last `retention` steps.
    ///
    /// A `retention` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Create`] if the directory cannot be created.
    pub async fn with_retention(base: Option<&Path>, retention: u64) -> Result<Self, QueueError> {
        let base = base.map_or_else(std::env::temp_dir, Path::to_path_buf);
        fs::create_dir_all(&base)
            .await
            .map_err(|source| QueueError::Create {
                path: base.clone(),
                source,
            })?;

        let dir = base.join(format!("queue-{}", Uuid::new_v4()));
        fs::create_dir(&dir)
            .await
            .map_err(|source| QueueError::Create {
                path: dir.clone(),
                source,
            })?;

        let (high_water, _) = watch::channel(0);
        info!(dir = %dir.display(), retention, "event queue created");

        Ok(Self {
            shared: Arc::new(QueueShared {
                dir,
                high_water,
                retention: retention.max(1),
            }),
        })
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// The retention window in steps.
    pub fn retention(&self) -> u64 {
        self.shared.retention
    }

    /// Highest step stored so far (`0` before the first push).
    pub fn high_water_mark(&self) -> u64 {
        *self.shared.high_water.borrow()
    }

    /// Store `event` as the record for `step` and wake every subscriber.
    ///
    /// The high-water mark only moves forward; pushing a step at or below it
    /// stores the record without lowering the mark. Callers push steps in
    /// the order the engine produced them.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::StepExists`] if a record for `step` is already
    /// stored, or [`QueueError::Write`] if the record cannot be written.
    pub async fn push_step(&self, step: u64, event: &[u8]) -> Result<(), QueueError> {
        let path = self.shared.step_path(step);
        write_new(&path, event).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::AlreadyExists {
                QueueError::StepExists { step }
            } else {
                QueueError::Write { step, source }
            }
        })?;

        self.shared.high_water.send_if_modified(|high_water| {
            if step > *high_water {
                *high_water = step;
                true
            } else {
                false
            }
        });
        debug!(step, bytes = event.len(), "step pushed");

        self.schedule_trim(step);
        Ok(())
    }

    /// Read the record stored for `step`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotFound`] if no record exists, or
    /// [`QueueError::Read`] if reading fails.
    pub async fn read_step(&self, step: u64) -> Result<Vec<u8>, QueueError> {
        self.shared.read(step).await
    }

    /// Replay records for `start_step + 1`, `start_step + 2`, ... .
    ///
    /// The subscription waits for new pushes when caught up and ends when
    /// `cancel` fires or a needed record is missing.
    pub fn subscribe(&self, cancel: Cancellation, start_step: u64) -> Subscription {
        Subscription::new(Arc::clone(&self.shared), cancel, start_step)
    }

    /// Remove the storage directory and every record in it.
    ///
    /// Meant for shutdown: pushes after this fail and subscribers end as
    /// fallen behind. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Delete`] if the directory cannot be removed.
    pub async fn delete_all_steps(&self) -> Result<(), QueueError> {
        match fs::remove_dir_all(&self.shared.dir).await {
            Ok(()) => {
                info!(dir = %self.shared.dir.display(), "queue storage deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(QueueError::Delete {
                path: self.shared.dir.clone(),
                source,
            }),
        }
    }

    fn schedule_trim(&self, step: u64) {
        let Some(expired) = step.checked_sub(self.shared.retention) else {
            return;
        };
        let path = self.shared.step_path(expired);
        tokio::spawn(async move {
            match fs::remove_file(&path).await {
                Ok(()) => debug!(step = expired, "trimmed expired step"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!(step = expired, error = %e, "failed to trim expired step"),
            }
        });
    }
}

/// Write a new file, failing with `AlreadyExists` if it is present.
async fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}
