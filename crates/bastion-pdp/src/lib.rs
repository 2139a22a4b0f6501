//! # bastion-pdp
//!
//! Attribute-based access control decision engine for IAM-style policy
//! documents.
//!
//! A request names a subject, a resource and an action. The engine enriches
//! it with attributes, matches every enabled statement's action and
//! resource patterns, evaluates the statement's condition block, and
//! combines the matches with deny-override semantics:
//!
//! - any matching `Deny` statement denies immediately,
//! - otherwise any matching `Allow` statement permits,
//! - otherwise the request is implicitly denied.
//!
//! ## Modules
//!
//! - [`engine`] - Policy decision point and combining algorithm
//! - [`matcher`] - Action and resource pattern matching
//! - [`condition`] - Condition operators and logical composition
//! - [`context`] - Working evaluation context construction
//! - [`model`] - Policy, request and decision types
//! - [`storage`] - Policy store and attribute resolver traits
//! - [`value`] - Dynamic attribute values and conversions
//! - [`path`] - Attribute path resolution
//! - [`config`] - Engine configuration
//! - [`error`] - Error types

pub mod condition;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod path;
pub mod storage;
pub mod value;

pub use condition::{ConditionBlock, ConditionEvaluator, Operator, RegexCache};
pub use config::{BusinessHoursConfig, ConfigError, PdpConfig, UnknownOperatorBehavior};
pub use context::{ContextError, WorkingContext, WorkingContextBuilder};
pub use engine::{EvaluationTrace, PolicyDecisionPoint, StatementTrace};
pub use error::{ErrorCategory, PdpError, PdpResult};
pub use model::{
    Decision, DecisionResult, Effect, EnvironmentData, EvaluationContext, EvaluationRequest,
    MatchedStatement, Policy, Statement,
};
pub use storage::{AttributeResolver, InMemoryPolicyStore, PolicyStore, StaticAttributeResolver};
pub use value::{Value, ValueMap};
