//! Hot-swappable routing table.
//!
//! [`ConfigStore`] owns the one piece of shared mutable state in the proxy: a pointer to the
//! active [`Snapshot`]. Readers take a reference with [`ConfigStore::current`] (a lock-free
//! `arc-swap` load) and keep it for the whole request. Writers build a complete new snapshot
//! first and then swap the pointer, so nobody can observe a half-updated table. Old snapshots
//! are dropped once the last request holding them finishes.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError},
};

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::{
    config::{
        loader::{ConfigLoadError, load_routing_table},
        models::RoutingConfig,
        validation::RoutingTableValidator,
    },
    core::target::{Target, TargetError},
};

/// One immutable, published routing table together with its parsed targets.
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    config: RoutingConfig,
    targets: HashMap<String, Result<Target, TargetError>>,
}

impl Snapshot {
    fn new(generation: u64, config: RoutingConfig) -> Self {
        let targets = config
            .routes
            .iter()
            .map(|(key, raw)| (key.clone(), Target::parse(raw)))
            .collect();

        Self {
            generation,
            config,
            targets,
        }
    }

    /// Publication counter, starting at 1 for the startup table.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Parsed target for `key`; `None` when no route uses that key.
    pub fn target(&self, key: &str) -> Option<&Result<Target, TargetError>> {
        self.targets.get(key)
    }

    pub fn route_count(&self) -> usize {
        self.config.routes.len()
    }
}

/// Owner of the active routing snapshot.
pub struct ConfigStore {
    path: PathBuf,
    current: ArcSwap<Snapshot>,
    // Last published generation; held across the swap so generations never go backwards
    generation: std::sync::Mutex<u64>,
    // Serializes load+publish so concurrent reloads cannot interleave
    reload_lock: Mutex<()>,
}

impl ConfigStore {
    /// Load the routing table at `path` and make it the first active snapshot.
    ///
    /// This is the startup path: any error here should stop the process.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigLoadError> {
        let path = path.into();
        let config = Self::load(&path).await?;
        let store = Self::with_config(path, config);
        let snapshot = store.current();
        tracing::info!(
            generation = snapshot.generation(),
            routes = snapshot.route_count(),
            mode = %snapshot.config().mode,
            "Loaded initial routing table from {}",
            store.path.display()
        );
        Ok(store)
    }

    /// Build a store around an already-loaded table. Reloads will read from `path`.
    pub fn with_config(path: impl Into<PathBuf>, config: RoutingConfig) -> Self {
        Self::log_validation_issues(&config);
        Self {
            path: path.into(),
            current: ArcSwap::from_pointee(Snapshot::new(1, config)),
            generation: std::sync::Mutex::new(1),
            reload_lock: Mutex::new(()),
        }
    }

    /// Read and parse a routing table without publishing it.
    pub async fn load(path: &Path) -> Result<RoutingConfig, ConfigLoadError> {
        load_routing_table(path).await
    }

    /// Atomically replace the active snapshot with one wrapping `config`.
    pub fn publish(&self, config: RoutingConfig) -> Arc<Snapshot> {
        Self::log_validation_issues(&config);
        let mut generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        let snapshot = Arc::new(Snapshot::new(*generation, config));
        self.current.store(snapshot.clone());
        snapshot
    }

    /// The active snapshot. Never blocks on writers.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Re-read the routing table from the startup path and publish it.
    ///
    /// On failure the active snapshot is left untouched and the error is returned for the
    /// caller to report. Concurrent calls run one after another; the last one to finish wins.
    pub async fn reload(&self) -> Result<Arc<Snapshot>, ConfigLoadError> {
        let _guard = self.reload_lock.lock().await;
        let config = Self::load(&self.path).await?;
        Ok(self.publish(config))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn log_validation_issues(config: &RoutingConfig) {
        for issue in RoutingTableValidator::validate(config) {
            tracing::warn!("Routing table issue: {}", issue);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Seek, Write},
        time::Duration,
    };

    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::models::RoutingMode;

    fn write_table(file: &mut NamedTempFile, content: &str) {
        let f = file.as_file_mut();
        f.set_len(0).unwrap();
        f.rewind().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
    }

    #[tokio::test]
    async fn test_open_publishes_first_snapshot() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write_table(
            &mut file,
            r#"{"mode":"path","routes":{"api":"http://localhost:9000"}}"#,
        );

        let store = ConfigStore::open(file.path()).await.unwrap();
        let snapshot = store.current();
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(snapshot.config().mode, RoutingMode::Path);
        assert!(matches!(snapshot.target("api"), Some(Ok(_))));
        assert!(snapshot.target("other").is_none());
    }

    #[tokio::test]
    async fn test_open_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigStore::open(dir.path().join("telepath.json")).await;
        assert!(matches!(result, Err(ConfigLoadError::Read { .. })));
    }

    #[tokio::test]
    async fn test_invalid_target_is_cached_as_error() {
        let store = ConfigStore::with_config(
            "unused.json",
            RoutingConfig::builder()
                .path_mode()
                .route("k", "not a url")
                .route("ok", "http://ok:1")
                .build(),
        );
        let snapshot = store.current();
        assert!(matches!(snapshot.target("k"), Some(Err(_))));
        assert!(matches!(snapshot.target("ok"), Some(Ok(_))));
    }

    #[tokio::test]
    async fn test_publish_swaps_but_held_snapshot_is_unchanged() {
        let store = ConfigStore::with_config(
            "unused.json",
            RoutingConfig::builder()
                .path_mode()
                .route("a", "http://a:1")
                .build(),
        );
        let held = store.current();

        let published = store.publish(
            RoutingConfig::builder()
                .header_mode("X-Env")
                .route("b", "http://b:2")
                .build(),
        );

        assert_eq!(published.generation(), 2);
        assert_eq!(store.current().generation(), 2);
        assert!(store.current().target("b").is_some());

        assert_eq!(held.generation(), 1);
        assert_eq!(held.config().mode, RoutingMode::Path);
        assert!(held.target("a").is_some());
        assert!(held.target("b").is_none());
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_content() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write_table(&mut file, r#"{"mode":"path","routes":{"a":"http://a:1"}}"#);
        let store = ConfigStore::open(file.path()).await.unwrap();

        write_table(&mut file, r#"{"mode":"path","routes":{"b":"http://b:2"}}"#);
        let snapshot = store.reload().await.unwrap();

        assert_eq!(snapshot.generation(), 2);
        assert!(store.current().target("a").is_none());
        assert!(store.current().target("b").is_some());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_active_snapshot() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write_table(&mut file, r#"{"mode":"path","routes":{"a":"http://a:1"}}"#);
        let store = ConfigStore::open(file.path()).await.unwrap();
        let before = store.current();

        write_table(&mut file, r#"{"mode": "path", "routes": {"#);
        let err = store.reload().await.unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));

        let after = store.current();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(after.target("a").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_never_see_torn_tables() {
        // Every table pairs the mode with a matching route key, so a mix of two tables
        // would show up as a mismatch.
        fn table(i: usize) -> RoutingConfig {
            if i % 2 == 0 {
                RoutingConfig::builder()
                    .path_mode()
                    .route(format!("path-{i}"), format!("http://p{i}:80"))
                    .build()
            } else {
                RoutingConfig::builder()
                    .header_mode(format!("X-Gen-{i}"))
                    .route(format!("header-{i}"), format!("http://h{i}:80"))
                    .build()
            }
        }

        let store = Arc::new(ConfigStore::with_config("unused.json", table(0)));

        let mut readers = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    let snapshot = store.current();
                    let config = snapshot.config();
                    let (key, _) = config.routes.iter().next().unwrap();
                    match config.mode {
                        RoutingMode::Path => {
                            assert!(key.starts_with("path-"));
                            assert!(config.header_name.is_empty());
                        }
                        RoutingMode::Header => {
                            let suffix = key.trim_start_matches("header-");
                            assert_eq!(config.header_name, format!("X-Gen-{suffix}"));
                        }
                        RoutingMode::Other(_) => panic!("unexpected mode"),
                    }
                    assert!(matches!(snapshot.target(key), Some(Ok(_))));
                    tokio::task::yield_now().await;
                }
            }));
        }

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 1..200 {
                    store.publish(table(i));
                    tokio::time::sleep(Duration::from_micros(50)).await;
                }
            })
        };

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(store.current().generation(), 200);
    }

    #[test]
    fn test_concurrent_publishers_keep_generation_monotonic() {
        let store = Arc::new(ConfigStore::with_config(
            "unused.json",
            RoutingConfig::builder().path_mode().build(),
        ));

        let publishers: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let mut last_seen = 0;
                    for i in 0..250 {
                        store.publish(
                            RoutingConfig::builder()
                                .path_mode()
                                .route(format!("t{t}-{i}"), "http://h:1")
                                .build(),
                        );
                        let seen = store.current().generation();
                        assert!(seen >= last_seen, "generation went from {last_seen} to {seen}");
                        last_seen = seen;
                    }
                })
            })
            .collect();

        for publisher in publishers {
            publisher.join().unwrap();
        }
        assert_eq!(store.current().generation(), 1 + 4 * 250);
    }
}
