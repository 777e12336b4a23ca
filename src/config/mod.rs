pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoadError, load_routing_table, load_settings};
pub use models::*;
pub use validation::{RoutingTableValidator, ValidationIssue};
