use std::sync::Arc;

use eyre::Result;
use tokio::{signal, sync::watch};

/// Represents different shutdown reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT or SIGTERM
    Signal,
    /// Requested from code (embedding, tests)
    Requested,
}

/// Coordinates shutdown between the signal listener and the server.
///
/// Cheap to clone; all clones observe the same state. Waiting after the shutdown has
/// already been triggered returns immediately.
#[derive(Clone)]
pub struct GracefulShutdown {
    state: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    /// Check if shutdown has been initiated
    pub fn is_shutdown_initiated(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Trigger shutdown. Only the first reason is kept.
    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        let first = self.state.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
        if first {
            tracing::info!("Shutdown triggered: {:?}", reason);
        } else {
            tracing::warn!("Shutdown already initiated, ignoring {:?}", reason);
        }
    }

    /// Wait for SIGINT (Ctrl+C) or SIGTERM and trigger shutdown.
    pub async fn run_signal_handler(&self) -> Result<()> {
        tracing::info!("Signal handler started. Listening for SIGTERM and SIGINT");

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
            result = wait_for_sigterm() => {
                result?;
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }

        self.trigger_shutdown(ShutdownReason::Signal);
        Ok(())
    }

    /// Resolve once shutdown has been triggered, returning the reason.
    pub async fn wait_for_shutdown_signal(&self) -> ShutdownReason {
        let mut rx = self.state.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).unwrap_or(ShutdownReason::Requested),
            // The sender lives in `self`, so this cannot close while we wait
            Err(_) => ShutdownReason::Requested,
        }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    // On non-Unix systems, we only have Ctrl+C
    std::future::pending::<()>().await;
    Ok(())
}
