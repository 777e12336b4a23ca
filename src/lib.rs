//! Telepath - a hot-reloadable, key-routed reverse proxy.
//!
//! Telepath forwards every inbound HTTP request to one backend chosen by a *routing key*.
//! Depending on the routing table's mode the key is either the value of a configured request
//! header, or the first segment of the request path (which is then stripped before
//! forwarding). The routing table is a small JSON document that can be rewritten on disk
//! and reloaded without restarting the process.
//!
//! # Features
//! - Header-based and path-based key extraction
//! - Single-host forwarding with streaming request and response bodies
//! - Lock-free reads of an atomically swapped routing snapshot
//! - Reload on `SIGHUP`, on file change, or from code, with failed reloads keeping the
//!   previous table
//! - Structured logging via `tracing`
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use telepath::{ConfigStore, HttpClientAdapter, HttpHandler, Reloader, SignalReloadTrigger};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let store = Arc::new(ConfigStore::open("./telepath.json").await?);
//! let _reloads = Reloader::new(store.clone())
//!     .with_trigger(Arc::new(SignalReloadTrigger::new()))
//!     .spawn()?;
//! let handler = Arc::new(HttpHandler::new(store, Arc::new(HttpClientAdapter::new()?)));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! telepath::adapters::http_server::serve(listener, handler, std::future::pending()).await?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! Business logic lives in `core` (snapshot store, router, dispatcher, reload task).
//! `ports` declares the traits `core` depends on and `adapters` implements them with hyper,
//! axum, POSIX signals and filesystem notifications.
//!
//! # Error Handling
//! Request-level failures are typed (`ProxyError` and the errors it wraps) and map to a
//! status code. Process-level code returns `eyre::Result`.
pub mod admin;
pub mod config;
pub mod error;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{
        FileWatchReloadTrigger, HttpClientAdapter, HttpHandler, ManualReloadTrigger,
        ReloadHandle, SignalReloadTrigger,
    },
    core::{ConfigStore, Dispatcher, Reloader, Snapshot},
    error::ProxyError,
    ports::{http_client::HttpClient, reload_trigger::ReloadTrigger},
    utils::GracefulShutdown,
};
