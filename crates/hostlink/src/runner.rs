//! Standalone tick loop used when no host application drives the gateway.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use thiserror::Error;
use tracing::info;

use crate::gateway::Gateway;

const RUNNER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runner");

/// Errors reported while preparing the tick loop.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    InstallSignals {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Returns a flag raised when the process receives a termination signal.
///
/// # Errors
///
/// Returns [`RunnerError::InstallSignals`] if a handler cannot be registered.
pub fn shutdown_flag() -> Result<Arc<AtomicBool>, RunnerError> {
    let flag = Arc::new(AtomicBool::new(false));
    for signal in [SIGTERM, SIGINT, SIGQUIT, SIGHUP] {
        signal_hook::flag::register(signal, Arc::clone(&flag))
            .map_err(|source| RunnerError::InstallSignals { source })?;
    }
    Ok(flag)
}

/// Advances `gateway` once per `tick` until `shutdown` is raised, then closes
/// it.
pub fn run_until(gateway: &mut Gateway, tick: Duration, shutdown: &AtomicBool) {
    info!(
        target: RUNNER_TARGET,
        address = %gateway.local_addr(),
        tick_ms = tick.as_millis(),
        "gateway tick loop running"
    );
    while !shutdown.load(Ordering::SeqCst) {
        gateway.advance();
        thread::sleep(tick);
    }
    info!(
        target: RUNNER_TARGET,
        open_connections = gateway.open_connections(),
        "shutdown requested"
    );
    gateway.shutdown();
}
