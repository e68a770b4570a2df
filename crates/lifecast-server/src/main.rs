//! Lifecast server binary.
//!
//! Wires the Life engine, the step event queue, and the browser front end
//! into one process and runs until Ctrl-C or SIGTERM.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `lifecast-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the engine and the event queue
//! 4. Register the step publisher and spawn the queue pump
//! 5. Bind the HTTP listener and serve
//!
//! # Shutdown Sequence
//!
//! 1. Stop autoplay and end every event stream
//! 2. Drain in-flight HTTP requests
//! 3. Drop the publisher and let the pump store what is left
//! 4. Delete every stored step

mod error;
mod publisher;

use std::path::PathBuf;
use std::sync::Arc;

use lifecast_core::config::LoggingConfig;
use lifecast_core::{Engine, LifecastConfig};
use lifecast_observer::{start_server, AppState, Renderer, ServerConfig};
use lifecast_queue::EventQueue;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;
use crate::publisher::StepPublisher;

const DEFAULT_CONFIG_PATH: &str = "lifecast-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, queue setup, or the HTTP listener
/// fails, or if the queue cannot be cleaned up at shutdown.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("lifecast-server starting");
    info!(
        rows = config.grid.rows,
        cols = config.grid.cols,
        interval_ms = config.autoplay.interval_ms,
        retention_steps = config.queue.retention_steps,
        "Configuration loaded"
    );

    // 3. Create the engine and the event queue.
    let engine = Engine::from_config(&config);
    let queue =
        EventQueue::with_retention(config.queue.tmp_dir.as_deref(), config.queue.retention_steps)
            .await?;
    info!(dir = %queue.dir().display(), "Event queue created");

    // 4. Publish every step into the queue.
    let renderer = Arc::new(Renderer::new()?);
    let (step_publisher, rx) = StepPublisher::channel(Arc::clone(&renderer));
    let publisher_handle = step_publisher.attach(&engine);
    let pump_task = tokio::spawn(publisher::pump(queue.clone(), rx));
    info!(callback_id = publisher_handle.id(), "Step publisher registered");

    // 5. Bind and serve.
    let state = Arc::new(AppState::new(engine.clone(), queue.clone(), renderer));
    let server_config = ServerConfig::from(&config.http);

    let signal_task = {
        let engine = engine.clone();
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move {
            match shutdown_signal().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "signal handler failed; shutting down"),
            }
            engine.stop();
            shutdown.cancel();
        })
    };

    let served = start_server(&server_config, Arc::clone(&state)).await;

    // The server can also end on its own after a bind or I/O failure.
    signal_task.abort();
    engine.stop();
    state.shutdown.cancel();

    publisher_handle.unsubscribe();
    match pump_task.await {
        Ok(stored) => info!(stored, "Step pump drained"),
        Err(e) => error!(error = %e, "step pump task failed"),
    }

    queue.delete_all_steps().await?;
    served?;

    info!(final_step = engine.step(), "lifecast-server shutdown complete");
    Ok(())
}

/// Load configuration from `LIFECAST_CONFIG` or `lifecast-config.yaml`.
///
/// A missing file means defaults, still subject to environment overrides.
fn load_config() -> Result<LifecastConfig, AppError> {
    let path = std::env::var("LIFECAST_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = if path.exists() {
        LifecastConfig::from_file(&path)?
    } else {
        LifecastConfig::from_env()?
    };
    Ok(config)
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
