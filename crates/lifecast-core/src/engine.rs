//! The simulation engine: grid ownership, step protocol, and autoplay.
//!
//! [`Engine`] serializes every operation behind one exclusive lock. A
//! mutation (advance, clear, toggle) copies the live grid into the scratch
//! grid, mutates the live grid, bumps the step counter, and then notifies
//! every registered callback, all before the lock is released. Callbacks
//! therefore always see a consistent pair of (current, previous) grids.
//!
//! # Callbacks
//!
//! Callbacks run synchronously while the lock is held. They must be fast
//! and must not call back into the engine, or they will deadlock. Work that
//! may block is handed off to a channel.
//!
//! # Autoplay
//!
//! [`Engine::toggle_run`] starts or stops a background Tokio task that
//! calls [`Engine::advance`] on a fixed interval. Each tick re-checks,
//! inside the lock, that its own autoplay generation is still current.
//! Stopping clears the generation under the same lock, so once
//! `toggle_run` returns `false` no further step from that task is applied.
//! A tick that won the lock before the stop still completes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::LifecastConfig;
use crate::grid::{CellChange, Grid};

/// Default cadence of the autoplay ticker.
pub const DEFAULT_AUTOPLAY_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest autoplay cadence. Shorter intervals, including zero, are
/// raised to this.
pub const MIN_AUTOPLAY_INTERVAL: Duration = Duration::from_millis(1);

/// Callback identities are unique across every engine in the process.
static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Errors returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A cell coordinate lies outside the grid.
    #[error("cell ({x}, {y}) is outside the {cols}x{rows} grid")]
    OutOfBounds {
        /// Requested column.
        x: usize,
        /// Requested row.
        y: usize,
        /// Grid width.
        cols: usize,
        /// Grid height.
        rows: usize,
    },
}

/// Which operation produced a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// One generation of the Life rule.
    Advance,
    /// Every cell was zeroed.
    Clear,
    /// A single cell was flipped.
    Toggle {
        /// Column of the flipped cell.
        x: usize,
        /// Row of the flipped cell.
        y: usize,
    },
}

/// What a callback sees after a completed mutation.
#[derive(Debug)]
pub struct StepView<'a> {
    /// The step number this mutation produced.
    pub step: u64,
    /// The operation that produced it.
    pub kind: StepKind,
    /// The grid after the mutation.
    pub current: &'a Grid,
    /// The grid immediately before the mutation.
    pub previous: &'a Grid,
}

impl StepView<'_> {
    /// Cells that changed in this step, in row-major order.
    pub fn changes(&self) -> impl Iterator<Item = CellChange> + '_ {
        self.current.changes_from(self.previous)
    }
}

/// A registered step callback.
pub type StepCallback = Box<dyn FnMut(&StepView<'_>) + Send>;

/// A copy of the grid taken under the engine lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSnapshot {
    /// Step number at the time of the copy.
    pub step: u64,
    /// The grid contents.
    pub grid: Grid,
}

struct Autoplay {
    generation: u64,
    task: JoinHandle<()>,
}

struct EngineState {
    grid: Grid,
    scratch: Grid,
    step: u64,
    callbacks: Vec<(u64, StepCallback)>,
    autoplay: Option<Autoplay>,
    next_generation: u64,
}

impl EngineState {
    fn begin(&mut self) {
        self.scratch.copy_from(&self.grid);
    }

    fn finish(&mut self, kind: StepKind) -> u64 {
        self.step = self.step.saturating_add(1);
        debug!(step = self.step, ?kind, "step applied");

        let view = StepView {
            step: self.step,
            kind,
            current: &self.grid,
            previous: &self.scratch,
        };
        for (_, callback) in &mut self.callbacks {
            callback(&view);
        }
        self.step
    }

    fn advance(&mut self) -> u64 {
        self.begin();
        self.grid.advance_from(&self.scratch);
        self.finish(StepKind::Advance)
    }

    fn is_current_autoplay(&self, generation: u64) -> bool {
        self.autoplay
            .as_ref()
            .is_some_and(|autoplay| autoplay.generation == generation)
    }
}

struct Shared {
    state: Mutex<EngineState>,
    interval: Duration,
    rows: usize,
    cols: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        // A panicking callback poisons the lock; the grid itself is still
        // consistent because every mutation completes before notification.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared handle to a simulation engine.
///
/// Cloning is cheap; all clones operate on the same grid.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("rows", &self.shared.rows)
            .field("cols", &self.shared.cols)
            .field("interval", &self.shared.interval)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine around an initial grid.
    ///
    /// `interval` is clamped to at least [`MIN_AUTOPLAY_INTERVAL`].
    pub fn new(grid: Grid, interval: Duration) -> Self {
        let interval = interval.max(MIN_AUTOPLAY_INTERVAL);
        let rows = grid.rows();
        let cols = grid.cols();
        let scratch = grid.clone();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState {
                    grid,
                    scratch,
                    step: 0,
                    callbacks: Vec::new(),
                    autoplay: None,
                    next_generation: 0,
                }),
                interval,
                rows,
                cols,
            }),
        }
    }

    /// Create an all-dead engine sized and paced by the configuration.
    pub fn from_config(config: &LifecastConfig) -> Self {
        Self::new(
            Grid::new(config.grid.rows, config.grid.cols),
            config.autoplay.interval(),
        )
    }

    /// Grid dimensions as `(rows, cols)`. Fixed for the engine's lifetime.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.shared.rows, self.shared.cols)
    }

    /// The autoplay cadence.
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Apply one generation of the Life rule and notify callbacks.
    ///
    /// Returns the new step number.
    pub fn advance(&self) -> u64 {
        self.shared.lock().advance()
    }

    /// Kill every cell and notify callbacks. Counts as a step even when the
    /// grid was already empty.
    pub fn clear(&self) -> u64 {
        let mut state = self.shared.lock();
        state.begin();
        state.grid.clear();
        state.finish(StepKind::Clear)
    }

    /// Flip the cell at `(x, y)` and notify callbacks.
    ///
    /// Returns the cell's new value (`1` if it became alive, `0` if it died).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] without touching the grid or
    /// the step counter when the coordinate is outside the grid.
    pub fn toggle_cell(&self, x: usize, y: usize) -> Result<u8, EngineError> {
        let mut state = self.shared.lock();
        let Some(current) = state.grid.get(x, y) else {
            return Err(EngineError::OutOfBounds {
                x,
                y,
                cols: self.shared.cols,
                rows: self.shared.rows,
            });
        };

        state.begin();
        let value = u8::from(current == 0);
        let _ = state.grid.set(x, y, value);
        state.finish(StepKind::Toggle { x, y });
        Ok(value)
    }

    /// Register a callback invoked once per completed step, in registration
    /// order, while the engine lock is held.
    ///
    /// The returned handle removes exactly this registration.
    pub fn subscribe<F>(&self, callback: F) -> CallbackHandle
    where
        F: FnMut(&StepView<'_>) + Send + 'static,
    {
        let id = NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed);
        let mut state = self.shared.lock();
        state.callbacks.push((id, Box::new(callback)));
        debug!(callback_id = id, total = state.callbacks.len(), "callback registered");
        CallbackHandle {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Number of registered callbacks.
    pub fn callback_count(&self) -> usize {
        self.shared.lock().callbacks.len()
    }

    /// Run `f` against the live grid and current step under the lock.
    ///
    /// `f` must not call back into the engine.
    pub fn read<R>(&self, f: impl FnOnce(&Grid, u64) -> R) -> R {
        let state = self.shared.lock();
        f(&state.grid, state.step)
    }

    /// Copy the grid and step number.
    pub fn snapshot(&self) -> GridSnapshot {
        self.read(|grid, step| GridSnapshot {
            step,
            grid: grid.clone(),
        })
    }

    /// The current step number.
    pub fn step(&self) -> u64 {
        self.shared.lock().step
    }

    /// Whether the autoplay ticker is active.
    pub fn is_running(&self) -> bool {
        self.shared.lock().autoplay.is_some()
    }

    /// Start autoplay if it is not already running.
    ///
    /// Returns whether autoplay is running afterwards. Must be called from
    /// within a Tokio runtime; outside one, nothing is started and `false`
    /// is returned.
    pub fn start(&self) -> bool {
        let mut state = self.shared.lock();
        self.start_locked(&mut state)
    }

    /// Stop autoplay if it is running.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        Self::stop_locked(&mut state);
    }

    /// Start autoplay when stopped, stop it when running.
    ///
    /// Returns `true` if autoplay is running after the call.
    pub fn toggle_run(&self) -> bool {
        let mut state = self.shared.lock();
        if state.autoplay.is_some() {
            Self::stop_locked(&mut state);
            false
        } else {
            self.start_locked(&mut state)
        }
    }

    fn start_locked(&self, state: &mut EngineState) -> bool {
        if state.autoplay.is_some() {
            return true;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("autoplay requested outside a Tokio runtime; not started");
            return false;
        };

        let generation = state.next_generation;
        state.next_generation = state.next_generation.wrapping_add(1);

        let task = runtime.spawn(run_autoplay(
            Arc::downgrade(&self.shared),
            generation,
            self.shared.interval,
        ));
        state.autoplay = Some(Autoplay { generation, task });
        info!(
            generation,
            interval_ms = self.shared.interval.as_millis(),
            step = state.step,
            "autoplay started"
        );
        true
    }

    fn stop_locked(state: &mut EngineState) {
        if let Some(autoplay) = state.autoplay.take() {
            autoplay.task.abort();
            info!(generation = autoplay.generation, step = state.step, "autoplay stopped");
        }
    }
}

/// Removes a callback registration.
#[derive(Debug, Clone)]
pub struct CallbackHandle {
    id: u64,
    shared: Weak<Shared>,
}

impl CallbackHandle {
    /// The process-unique identity of this registration.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Remove the callback. Later calls, or calls after the engine is gone,
    /// do nothing.
    ///
    /// Removal takes the engine lock, so it lands strictly before or after
    /// any notification pass. Remaining callbacks keep their order.
    pub fn unsubscribe(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut state = shared.lock();
        let before = state.callbacks.len();
        state.callbacks.retain(|(id, _)| *id != self.id);
        if state.callbacks.len() != before {
            debug!(callback_id = self.id, "callback removed");
        }
    }
}

async fn run_autoplay(shared: Weak<Shared>, generation: u64, period: Duration) {
    let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if !autoplay_tick(&shared, generation) {
            break;
        }
    }
    debug!(generation, "autoplay task exited");
}

/// Apply one autoplay step. Returns `false` once the task should exit.
fn autoplay_tick(shared: &Weak<Shared>, generation: u64) -> bool {
    let Some(shared) = shared.upgrade() else {
        return false;
    };
    let mut state = shared.lock();
    if !state.is_current_autoplay(generation) {
        return false;
    }
    state.advance();
    true
}
