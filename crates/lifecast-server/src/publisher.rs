//! Step callback that feeds the event queue.
//!
//! The engine invokes callbacks while holding its lock, so rendering
//! happens there (the grids are borrowed) but the file write does not.
//! Each rendered step goes over an unbounded channel to a single pump
//! task that appends it to the [`EventQueue`]. One producer and one
//! consumer keep queue order identical to step order.

use std::sync::Arc;

use lifecast_core::{CallbackHandle, Engine, StepView};
use lifecast_observer::Renderer;
use lifecast_queue::EventQueue;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, warn};

/// A step number and its rendered SSE payload.
pub type RenderedStep = (u64, Vec<u8>);

/// Renders each completed step and hands it to the pump.
pub struct StepPublisher {
    renderer: Arc<Renderer>,
    tx: UnboundedSender<RenderedStep>,
}

impl StepPublisher {
    /// Create a publisher and the receiving end for [`pump`].
    pub fn channel(renderer: Arc<Renderer>) -> (Self, UnboundedReceiver<RenderedStep>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { renderer, tx }, rx)
    }

    /// Register this publisher on `engine`.
    pub fn attach(self, engine: &Engine) -> CallbackHandle {
        engine.subscribe(move |view| self.publish(view))
    }

    /// Render `view` and queue it for storage.
    ///
    /// A render failure still publishes an empty record so the step
    /// sequence stays gap-free for subscribers.
    pub fn publish(&self, view: &StepView<'_>) {
        let event = self.renderer.step_event(view).unwrap_or_else(|e| {
            error!(step = view.step, error = %e, "failed to render step event");
            Vec::new()
        });
        if self.tx.send((view.step, event)).is_err() {
            warn!(step = view.step, "step pump gone; event dropped");
        }
    }
}

/// Append every received step to `queue` until all publishers are gone.
///
/// Returns the number of steps stored.
pub async fn pump(queue: EventQueue, mut rx: UnboundedReceiver<RenderedStep>) -> u64 {
    let mut stored: u64 = 0;
    while let Some((step, event)) = rx.recv().await {
        match queue.push_step(step, &event).await {
            Ok(()) => {
                stored = stored.saturating_add(1);
                debug!(step, bytes = event.len(), "step stored");
            }
            Err(e) => error!(step, error = %e, "failed to store step"),
        }
    }
    debug!(stored, "step pump finished");
    stored
}
