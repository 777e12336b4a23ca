pub mod file_watch;
pub mod manual;
pub mod signal;

pub use file_watch::FileWatchReloadTrigger;
pub use manual::{ManualReloadTrigger, ReloadHandle};
pub use signal::SignalReloadTrigger;
