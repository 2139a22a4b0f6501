//! Action and resource pattern matching.
//!
//! # Usage
//!
//! ```
//! use bastion_pdp::matcher::{action, resource};
//! use bastion_pdp::value::ValueMap;
//!
//! assert!(action::matches("document-service:file:*", "document-service:file:read"));
//! assert!(resource::matches("api:documents:*", "api:documents:42", &ValueMap::new()));
//! ```

pub mod action;
pub mod resource;

use crate::model::Statement;
use crate::value::ValueMap;

/// Outcome of matching one statement's target against a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetMatch {
    /// Some `Action` pattern matched.
    pub action: bool,
    /// Some `Resource` pattern matched.
    pub resource: bool,
    /// Some `NotResource` pattern matched.
    pub excluded: bool,
}

impl TargetMatch {
    /// Returns `true` if the statement applies to the request.
    #[must_use]
    pub fn applies(&self) -> bool {
        self.action && self.resource && !self.excluded
    }
}

/// Match a statement's action, resource and exclusion sets.
///
/// Resource patterns are only tried once the action matched.
#[must_use]
pub fn match_target(
    statement: &Statement,
    action: &str,
    resource: &str,
    context: &ValueMap,
) -> TargetMatch {
    let mut outcome = TargetMatch {
        action: action::matches_any(&statement.actions, action),
        ..Default::default()
    };
    if !outcome.action {
        return outcome;
    }

    outcome.resource = resource::matches_any(&statement.resources, resource, context);
    if outcome.resource {
        outcome.excluded = resource::matches_any(&statement.not_resources, resource, context);
    }
    outcome
}
