use std::fmt;

use eyre::Result;
use tokio::sync::mpsc;

/// A request to re-read the routing table. Carries no routing data, only where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadRequest {
    pub source: &'static str,
}

impl fmt::Display for ReloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source)
    }
}

/// Trait for external reload notifications (signals, file watches, in-process handles).
///
/// Implementations only deliver "reload now" events; the reload itself is performed by the
/// consumer of the channel, so the trigger never touches the routing table.
pub trait ReloadTrigger: Send + Sync {
    /// Short name used in log records.
    fn name(&self) -> &'static str;

    /// Start delivering reload requests.
    ///
    /// Implementations should use a bounded channel and `try_send`, so that a burst of
    /// events while a reload is running collapses into a single follow-up reload.
    /// May only be called once per trigger.
    fn watch(&self) -> Result<mpsc::Receiver<ReloadRequest>>;
}
