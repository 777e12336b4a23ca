//! Background reload task.
//!
//! Every configured [`ReloadTrigger`] feeds one task, which re-reads the routing table each
//! time a request arrives. Requests are handled one at a time, so reloads never overlap, and
//! triggers use bounded channels so a burst collapses into at most one queued reload.
use std::sync::Arc;

use eyre::{Result, WrapErr};
use futures_util::{StreamExt, stream::select_all};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::{core::store::ConfigStore, ports::reload_trigger::ReloadTrigger};

pub struct Reloader {
    store: Arc<ConfigStore>,
    triggers: Vec<Arc<dyn ReloadTrigger>>,
}

impl Reloader {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            triggers: Vec::new(),
        }
    }

    pub fn with_trigger(mut self, trigger: Arc<dyn ReloadTrigger>) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Subscribe to every trigger and start the reload task.
    ///
    /// Fails if any trigger cannot be started; nothing is spawned in that case.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let mut streams = Vec::with_capacity(self.triggers.len());
        for trigger in &self.triggers {
            let rx = trigger
                .watch()
                .wrap_err_with(|| format!("Failed to start reload trigger '{}'", trigger.name()))?;
            tracing::info!("Reload trigger '{}' active", trigger.name());
            streams.push(ReceiverStream::new(rx));
        }

        let store = self.store;
        // Triggers own watcher handles that must outlive the task
        let triggers = self.triggers;
        let mut requests = select_all(streams);

        Ok(tokio::spawn(async move {
            let _triggers = triggers;
            tracing::info!("Reload task started.");

            while let Some(request) = requests.next().await {
                tracing::info!(
                    "Reload requested by {}, reading {}",
                    request,
                    store.path().display()
                );

                match store.reload().await {
                    Ok(snapshot) => {
                        tracing::info!(
                            generation = snapshot.generation(),
                            routes = snapshot.route_count(),
                            mode = %snapshot.config().mode,
                            "Routing table reloaded"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to reload routing table: {}. Keeping generation {}.",
                            e,
                            store.current().generation()
                        );
                    }
                }
            }

            tracing::info!("Reload task is shutting down.");
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, time::Duration};

    use super::*;
    use crate::adapters::ManualReloadTrigger;

    async fn wait_for_generation(store: &ConfigStore, generation: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.current().generation() < generation {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for reload");
    }

    #[tokio::test]
    async fn test_manual_trigger_reloads_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telepath.json");
        std::fs::write(&path, r#"{"mode":"path","routes":{"a":"http://a:1"}}"#).unwrap();

        let store = Arc::new(ConfigStore::open(&path).await.unwrap());
        let trigger = Arc::new(ManualReloadTrigger::new());
        let handle = trigger.handle();
        let _task = Reloader::new(store.clone())
            .with_trigger(trigger)
            .spawn()
            .unwrap();

        std::fs::write(&path, r#"{"mode":"path","routes":{"b":"http://b:2"}}"#).unwrap();
        assert!(handle.request_reload());
        wait_for_generation(&store, 2).await;

        assert!(store.current().target("b").is_some());
        assert!(store.current().target("a").is_none());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_serving_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telepath.json");
        std::fs::write(&path, r#"{"mode":"path","routes":{"a":"http://a:1"}}"#).unwrap();

        let store = Arc::new(ConfigStore::open(&path).await.unwrap());
        let trigger = Arc::new(ManualReloadTrigger::new());
        let handle = trigger.handle();
        let _task = Reloader::new(store.clone())
            .with_trigger(trigger)
            .spawn()
            .unwrap();

        {
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(b"{ not json").unwrap();
        }
        assert!(handle.request_reload());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.current().generation(), 1);

        // A later valid write is still picked up
        std::fs::write(&path, r#"{"mode":"path","routes":{"c":"http://c:3"}}"#).unwrap();
        let mut queued = handle.request_reload();
        while !queued {
            tokio::time::sleep(Duration::from_millis(10)).await;
            queued = handle.request_reload();
        }
        wait_for_generation(&store, 2).await;
        assert!(store.current().target("c").is_some());
    }

    #[tokio::test]
    async fn test_no_triggers_ends_immediately() {
        let store = Arc::new(ConfigStore::with_config(
            "unused.json",
            Default::default(),
        ));
        let task = Reloader::new(store).spawn().unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
