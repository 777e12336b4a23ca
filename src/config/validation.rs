use crate::{
    config::models::{RoutingConfig, RoutingMode},
    core::target::Target,
};

/// A problem found in a routing table.
///
/// Findings are advisory: a table with issues is still published, and each issue only
/// surfaces for the requests it affects.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("Unknown mode {mode}: every request resolves to the empty routing key")]
    UnknownMode { mode: String },

    #[error("Mode is \"header\" but headerName is empty: every request will be rejected")]
    MissingHeaderName,

    #[error("Route '{key}' has an unusable target '{target}': {reason}")]
    InvalidTarget {
        key: String,
        target: String,
        reason: String,
    },
}

/// Routing table validator
pub struct RoutingTableValidator;

impl RoutingTableValidator {
    /// Collect every issue in `config`, routes sorted by key.
    pub fn validate(config: &RoutingConfig) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        match &config.mode {
            RoutingMode::Header if config.header_name.trim().is_empty() => {
                issues.push(ValidationIssue::MissingHeaderName);
            }
            RoutingMode::Other(raw) => issues.push(ValidationIssue::UnknownMode {
                mode: format!("{raw:?}"),
            }),
            _ => {}
        }

        let mut keys: Vec<&String> = config.routes.keys().collect();
        keys.sort();
        for key in keys {
            let target = &config.routes[key];
            if let Err(e) = Target::parse(target) {
                issues.push(ValidationIssue::InvalidTarget {
                    key: key.clone(),
                    target: target.clone(),
                    reason: e.to_string(),
                });
            }
        }

        issues
    }
}
