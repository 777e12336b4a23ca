use eyre::Result;
use tokio::sync::mpsc;

use crate::ports::reload_trigger::{ReloadRequest, ReloadTrigger};

const SOURCE: &str = "sighup";

/// Reload on `SIGHUP`, the signal `telepathctl refresh` sends.
///
/// Once registered, `SIGHUP` no longer terminates the process.
#[derive(Debug, Default)]
pub struct SignalReloadTrigger;

impl SignalReloadTrigger {
    pub fn new() -> Self {
        Self
    }
}

impl ReloadTrigger for SignalReloadTrigger {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn watch(&self) -> Result<mpsc::Receiver<ReloadRequest>> {
        listen_for_hangup()
    }
}

#[cfg(unix)]
fn listen_for_hangup() -> Result<mpsc::Receiver<ReloadRequest>> {
    use eyre::WrapErr;
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).wrap_err("Failed to register SIGHUP handler")?;
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("Received SIGHUP");
            if let Err(mpsc::error::TrySendError::Closed(_)) =
                tx.try_send(ReloadRequest { source: SOURCE })
            {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(not(unix))]
fn listen_for_hangup() -> Result<mpsc::Receiver<ReloadRequest>> {
    Err(eyre::eyre!("SIGHUP is not available on this platform"))
}
