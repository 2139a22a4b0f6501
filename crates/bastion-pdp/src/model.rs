//! Policy documents, requests and decisions.
//!
//! Policy documents use IAM-style keys:
//!
//! ```json
//! {
//!   "Id": "documents-owner",
//!   "Version": "2024-01-01",
//!   "Statement": [{
//!     "Sid": "OwnerReadWrite",
//!     "Effect": "Allow",
//!     "Action": ["document-service:file:read", "document-service:file:write"],
//!     "Resource": "api:documents:owner-${request:UserId}",
//!     "Condition": { "Bool": { "user.mfa": true } }
//!   }]
//! }
//! ```
//!
//! Requests and decisions use `snake_case` keys.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::condition::ConditionBlock;
use crate::error::{PdpError, PdpResult};
use crate::value::{Value, ValueMap};

// =============================================================================
// Policy
// =============================================================================

/// A named, independently enabled list of statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    /// Unique policy identifier.
    #[serde(alias = "id")]
    pub id: String,

    /// Human-readable name.
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Policy language version tag.
    #[serde(default, alias = "version", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Disabled policies are skipped during evaluation.
    #[serde(default = "default_true", alias = "enabled")]
    pub enabled: bool,

    /// Statements in declaration order.
    #[serde(
        rename = "Statement",
        alias = "statement",
        alias = "statements",
        deserialize_with = "one_or_many"
    )]
    pub statements: Vec<Statement>,
}

fn default_true() -> bool {
    true
}

impl Policy {
    /// Create an enabled policy with no statements.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            version: None,
            enabled: true,
            statements: Vec::new(),
        }
    }

    /// Set the policy name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a statement.
    #[must_use]
    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Set the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Parse one policy document.
    ///
    /// # Errors
    ///
    /// Returns `PdpError::Serialization` if the JSON does not describe a policy.
    pub fn from_json(json: &str) -> PdpResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a policy file holding either one policy or a list of them.
    ///
    /// # Errors
    ///
    /// Returns `PdpError::Serialization` if the JSON is neither shape.
    pub fn list_from_json(json: &str) -> PdpResult<Vec<Self>> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Document {
            Many(Vec<Policy>),
            One(Box<Policy>),
        }

        match serde_json::from_str::<Document>(json) {
            Ok(Document::Many(policies)) => Ok(policies),
            Ok(Document::One(policy)) => Ok(vec![*policy]),
            Err(e) => Err(PdpError::serialization(format!(
                "expected a policy or a list of policies: {e}"
            ))),
        }
    }
}

// =============================================================================
// Statement
// =============================================================================

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Grants access when matched.
    #[serde(alias = "allow", alias = "ALLOW")]
    Allow,
    /// Denies access when matched, overriding every Allow.
    #[serde(alias = "deny", alias = "DENY")]
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "Allow"),
            Self::Deny => write!(f, "Deny"),
        }
    }
}

/// One effect applied to a set of actions and resources, optionally
/// guarded by a condition block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    /// Optional identifier, used in decision reasons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Effect when the statement matches.
    pub effect: Effect,

    /// Action patterns; any may match.
    #[serde(rename = "Action", deserialize_with = "one_or_many")]
    pub actions: Vec<String>,

    /// Resource patterns; any may match.
    #[serde(rename = "Resource", deserialize_with = "one_or_many")]
    pub resources: Vec<String>,

    /// Resource patterns excluded from this statement.
    #[serde(
        rename = "NotResource",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub not_resources: Vec<String>,

    /// Condition block; empty means always satisfied.
    #[serde(default, skip_serializing_if = "ConditionBlock::is_empty")]
    pub condition: ConditionBlock,
}

impl Statement {
    /// Create a statement with no patterns and no conditions.
    #[must_use]
    pub fn new(effect: Effect) -> Self {
        Self {
            sid: None,
            effect,
            actions: Vec::new(),
            resources: Vec::new(),
            not_resources: Vec::new(),
            condition: ConditionBlock::new(),
        }
    }

    /// Set the statement identifier.
    #[must_use]
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Add an action pattern.
    #[must_use]
    pub fn with_action(mut self, pattern: impl Into<String>) -> Self {
        self.actions.push(pattern.into());
        self
    }

    /// Add a resource pattern.
    #[must_use]
    pub fn with_resource(mut self, pattern: impl Into<String>) -> Self {
        self.resources.push(pattern.into());
        self
    }

    /// Add an excluded resource pattern.
    #[must_use]
    pub fn with_not_resource(mut self, pattern: impl Into<String>) -> Self {
        self.not_resources.push(pattern.into());
        self
    }

    /// Add a condition operator entry.
    #[must_use]
    pub fn with_condition(mut self, operator: impl Into<String>, payload: impl Into<Value>) -> Self {
        self.condition.insert(operator.into(), payload.into());
        self
    }

    /// The `Sid`, or `#<index>` for anonymous statements.
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        self.sid
            .clone()
            .unwrap_or_else(|| format!("#{index}"))
    }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}

// =============================================================================
// Request
// =============================================================================

/// A single access question: may `subject_id` perform `action` on
/// `resource_id`?
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Subject (user or service) identifier.
    pub subject_id: String,

    /// Resource identifier matched against `Resource` patterns.
    pub resource_id: String,

    /// Action identifier matched against `Action` patterns.
    pub action: String,

    /// Evaluation time; the wall clock when absent.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,

    /// Free-form attributes merged into the working context last.
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub context: ValueMap,

    /// Client environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentData>,
}

impl EvaluationRequest {
    /// Create a request for `subject_id` performing `action` on `resource_id`.
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        resource_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            resource_id: resource_id.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    /// Set an explicit evaluation time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Add a caller context attribute.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attach environment data.
    #[must_use]
    pub fn with_environment(mut self, environment: EnvironmentData) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Parse a request document.
    ///
    /// # Errors
    ///
    /// Returns `PdpError::Serialization` if the JSON does not describe a request.
    pub fn from_json(json: &str) -> PdpResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check that subject, resource and action are present.
    ///
    /// # Errors
    ///
    /// Returns `PdpError::Validation` naming the first empty field.
    pub fn validate(&self) -> PdpResult<()> {
        if self.subject_id.trim().is_empty() {
            return Err(PdpError::validation("subject_id is required"));
        }
        if self.resource_id.trim().is_empty() {
            return Err(PdpError::validation("resource_id is required"));
        }
        if self.action.trim().is_empty() {
            return Err(PdpError::validation("action is required"));
        }
        Ok(())
    }
}

/// Client environment attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentData {
    /// Client IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,

    /// Raw `User-Agent` string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Country code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Region or state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Additional environment attributes.
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub custom: ValueMap,
}

impl EnvironmentData {
    /// Set the client IP address.
    #[must_use]
    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a custom environment attribute.
    #[must_use]
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

/// Attributes produced by the attribute resolver for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    /// Subject attributes, exposed as `user:*` and `user.*`.
    #[serde(default)]
    pub subject: ValueMap,

    /// Resource attributes, exposed as `resource:*` and `resource.*`.
    #[serde(default)]
    pub resource: ValueMap,

    /// Action metadata, exposed as `action:*`.
    #[serde(default)]
    pub action: ValueMap,

    /// Environment data; falls back to the request's when absent.
    #[serde(default)]
    pub environment: Option<EnvironmentData>,

    /// Evaluation time; falls back to the request's, then the wall clock.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

// =============================================================================
// Decision
// =============================================================================

/// Final outcome of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionResult {
    /// Access granted.
    Permit,
    /// Access denied.
    Deny,
}

impl fmt::Display for DecisionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => write!(f, "permit"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// A statement that contributed to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedStatement {
    /// Owning policy.
    pub policy_id: String,
    /// `Sid` or `#<index>`.
    pub statement_id: String,
    /// Statement effect.
    pub effect: Effect,
}

/// Decision returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// `permit` or `deny`.
    pub result: DecisionResult,

    /// Policies with at least one matching statement, in match order.
    pub matched_policies: Vec<String>,

    /// Every matching statement, in match order.
    #[serde(default)]
    pub matched_statements: Vec<MatchedStatement>,

    /// Human-readable explanation.
    pub reason: String,

    /// Wall time spent evaluating, in milliseconds.
    pub evaluation_time_ms: u64,
}

impl Decision {
    /// Returns `true` if access was granted.
    #[must_use]
    pub fn is_permit(&self) -> bool {
        self.result == DecisionResult::Permit
    }

    /// Returns `true` if access was denied.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.result == DecisionResult::Deny
    }
}
