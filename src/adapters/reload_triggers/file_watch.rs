use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use eyre::{Context, Result};
use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::ports::reload_trigger::{ReloadRequest, ReloadTrigger};

const SOURCE: &str = "file-watch";

/// Reload whenever the routing table file is created, modified or replaced.
///
/// The parent directory is watched rather than the file itself, so atomic
/// write-then-rename updates (as done by `telepathctl`) are seen.
pub struct FileWatchReloadTrigger {
    path: PathBuf,
    // Keeps the OS watcher alive for as long as the trigger exists
    watcher: Mutex<Option<notify::RecommendedWatcher>>,
}

impl FileWatchReloadTrigger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            watcher: Mutex::new(None),
        }
    }
}

impl ReloadTrigger for FileWatchReloadTrigger {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn watch(&self) -> Result<mpsc::Receiver<ReloadRequest>> {
        let mut slot = self
            .watcher
            .lock()
            .map_err(|_| eyre::eyre!("file watch trigger lock poisoned"))?;
        if slot.is_some() {
            return Err(eyre::eyre!("watch can only be called once"));
        }

        let (tx, rx) = mpsc::channel(1);
        let table_filename = self
            .path
            .file_name()
            .ok_or_else(|| eyre::eyre!("Invalid routing table path"))?
            .to_owned();

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        if (event.kind.is_modify() || event.kind.is_create())
                            && event
                                .paths
                                .iter()
                                .any(|p| p.file_name() == Some(&table_filename))
                        {
                            tracing::debug!("Routing table changed: {:?}", event.kind);
                            // A full channel means a reload is already queued
                            let _ = tx.try_send(ReloadRequest { source: SOURCE });
                        }
                    }
                    Err(e) => tracing::error!("File watch error: {:?}", e),
                }
            })?;

        let watch_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        watcher
            .watch(watch_dir, RecursiveMode::NonRecursive)
            .wrap_err("Failed to watch routing table directory")?;

        *slot = Some(watcher);
        Ok(rx)
    }
}
