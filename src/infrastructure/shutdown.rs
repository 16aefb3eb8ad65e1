//! Graceful Shutdown Handler
//!
//! Coordinates process shutdown with the batches still running.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Shutdown coordinator for graceful termination.
///
/// Holds two pieces of watched state: whether shutdown has started, and how
/// many batches are in flight. Once shutdown starts the API refuses new
/// batches and the binary waits (bounded) for the count to reach zero.
#[derive(Clone)]
pub struct ShutdownController {
    stopping: Arc<watch::Sender<bool>>,
    batches: Arc<watch::Sender<usize>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (stopping, _) = watch::channel(false);
        let (batches, _) = watch::channel(0);
        Self {
            stopping: Arc::new(stopping),
            batches: Arc::new(batches),
        }
    }

    /// Resolves once shutdown has been initiated.
    pub async fn wait(&self) {
        let mut rx = self.stopping.subscribe();
        let _ = rx.wait_for(|stopping| *stopping).await;
    }

    /// Initiate graceful shutdown. Later calls are no-ops.
    pub fn shutdown(&self) {
        if !self.stopping.send_replace(true) {
            tracing::info!("initiating graceful shutdown");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.stopping.borrow()
    }

    /// Batches in flight.
    pub fn active_batches(&self) -> usize {
        *self.batches.borrow()
    }

    /// Wait up to `timeout` for the in-flight count to reach zero.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let mut rx = self.batches.subscribe();
        let drained = tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0))
            .await
            .is_ok();
        if !drained {
            tracing::warn!("drain timeout: {} batches still running", self.active_batches());
        }
        drained
    }

    /// Register a batch; the count drops when the guard does.
    pub fn batch_guard(&self) -> BatchGuard {
        self.batches.send_modify(|n| *n += 1);
        BatchGuard {
            batches: self.batches.clone(),
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a batch counted as in flight until dropped.
pub struct BatchGuard {
    batches: Arc<watch::Sender<usize>>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.batches.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Install signal handlers for graceful shutdown.
///
/// Returns a future that completes when a shutdown signal is received.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }

    controller.shutdown();
}
