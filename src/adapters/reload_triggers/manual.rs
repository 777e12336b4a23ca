use std::sync::Mutex;

use eyre::Result;
use tokio::sync::mpsc;

use crate::ports::reload_trigger::{ReloadRequest, ReloadTrigger};

const SOURCE: &str = "manual";

/// In-process trigger for embedding code: reloads are requested through a [`ReloadHandle`].
pub struct ManualReloadTrigger {
    tx: mpsc::Sender<ReloadRequest>,
    rx: Mutex<Option<mpsc::Receiver<ReloadRequest>>>,
}

impl ManualReloadTrigger {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub fn handle(&self) -> ReloadHandle {
        ReloadHandle {
            tx: self.tx.clone(),
        }
    }
}

impl Default for ManualReloadTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadTrigger for ManualReloadTrigger {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn watch(&self) -> Result<mpsc::Receiver<ReloadRequest>> {
        self.rx
            .lock()
            .map_err(|_| eyre::eyre!("manual reload trigger lock poisoned"))?
            .take()
            .ok_or_else(|| eyre::eyre!("watch can only be called once"))
    }
}

/// Cloneable handle that asks for a reload.
#[derive(Clone, Debug)]
pub struct ReloadHandle {
    tx: mpsc::Sender<ReloadRequest>,
}

impl ReloadHandle {
    /// Queue a reload. Returns `false` when one is already queued (the request is merged
    /// into it) or when the reload task is gone.
    pub fn request_reload(&self) -> bool {
        self.tx.try_send(ReloadRequest { source: SOURCE }).is_ok()
    }
}
