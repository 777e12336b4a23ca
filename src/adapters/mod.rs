pub mod http_client;
pub mod http_handler;
pub mod http_server;
pub mod reload_triggers;

/// Re-export commonly used types from adapters
pub use http_client::HttpClientAdapter;
pub use http_handler::HttpHandler;
pub use reload_triggers::{
    FileWatchReloadTrigger, ManualReloadTrigger, ReloadHandle, SignalReloadTrigger,
};
