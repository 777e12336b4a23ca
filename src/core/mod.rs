pub mod dispatcher;
pub mod reloader;
pub mod router;
pub mod store;
pub mod target;

pub use dispatcher::Dispatcher;
pub use reloader::Reloader;
pub use router::{RouteDecision, route};
pub use store::{ConfigStore, Snapshot};
pub use target::Target;
