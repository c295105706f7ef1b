//! Signal-driven shutdown.
//!
//! The supervisor runs beside the log-stream reader. Whichever finishes first drives
//! [`ContainerEngine::shutdown`]; the engine makes that transition safe from either side.

use crate::engine::ContainerEngine;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Register for termination signals now and return a future that resolves with the signal
/// name when the first one arrives.
///
/// Registration happens before this returns, so a signal delivered while the caller is still
/// starting the container is not lost.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
#[cfg(unix)]
pub fn os_signals() -> std::io::Result<impl Future<Output = &'static str> + Send + 'static> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Register for Ctrl-C and return a future that resolves when it arrives.
///
/// # Errors
///
/// Never fails on this platform; the signature matches the unix variant.
#[cfg(not(unix))]
pub fn os_signals() -> std::io::Result<impl Future<Output = &'static str> + Send + 'static> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "ctrl-c",
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for ctrl-c");
                std::future::pending().await
            }
        }
    })
}

/// Background task that turns the first signal into a single shutdown.
#[derive(Debug)]
pub struct SignalSupervisor {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SignalSupervisor {
    /// Spawn the watcher. When `trigger` resolves, `shutdown` is cancelled and the engine is
    /// stopped; the task ends once the stop completes or times out. Cancelling `shutdown` from
    /// elsewhere ends the task without touching the engine.
    pub fn watch<F>(trigger: F, shutdown: CancellationToken, engine: Arc<ContainerEngine>) -> Self
    where
        F: Future<Output = &'static str> + Send + 'static,
    {
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                signal = trigger => {
                    tracing::info!("received {signal}, shutting down");
                    token.cancel();
                    if let Err(e) = engine.shutdown().await {
                        tracing::warn!(error = %e, "shutdown after {signal} did not complete");
                    }
                }
                () = token.cancelled() => {}
            }
        });
        Self { shutdown, task }
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Stop watching and wait for any in-flight shutdown to finish.
    pub async fn finish(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "signal supervisor task failed");
        }
    }
}
