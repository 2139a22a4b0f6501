//! Condition evaluation.
//!
//! A statement's condition block maps operator names to payloads:
//!
//! ```json
//! {
//!   "StringEquals": { "user:Department": "engineering" },
//!   "NumericGreaterThanEquals": { "user.clearance": 3 },
//!   "Or": [
//!     { "IsBusinessHours": { "environment.now": true } },
//!     { "ArrayContains": { "user.roles": "on-call" } }
//!   ]
//! }
//! ```
//!
//! Every top-level entry must hold (implicit AND); an empty block always
//! holds. Operator names are parsed case-insensitively into [`Operator`]
//! once per entry, and each family lives in its own module.
//!
//! Payloads stay as raw [`Value`]s until evaluation so that a malformed
//! payload fails only its own leaf instead of the whole policy document.

pub mod array;
pub mod boolean;
pub mod logical;
pub mod network;
pub mod numeric;
pub mod string;
pub mod temporal;

use std::fmt;
use std::str::FromStr;

use ipnetwork::IpNetwork;

use crate::config::{BusinessHoursConfig, PdpConfig, UnknownOperatorBehavior};
use crate::path;
use crate::value::{Value, ValueMap};

pub use string::RegexCache;

/// Operator name → payload, evaluated with implicit AND.
pub type ConditionBlock = ValueMap;

// =============================================================================
// Operator Registry
// =============================================================================

/// Every condition operator the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    StringEquals,
    StringNotEquals,
    StringLike,
    StringContains,
    StringStartsWith,
    StringEndsWith,
    StringRegex,

    NumericEquals,
    NumericNotEquals,
    NumericLessThan,
    NumericLessThanEquals,
    NumericGreaterThan,
    NumericGreaterThanEquals,
    NumericBetween,

    DateLessThan,
    DateLessThanEquals,
    DateGreaterThan,
    DateGreaterThanEquals,
    DateBetween,
    DayOfWeek,
    TimeOfDay,
    IsBusinessHours,

    ArrayContains,
    ArrayNotContains,
    ArraySize,

    IpInRange,
    IpNotInRange,
    IsInternalIp,

    Bool,

    And,
    Or,
    Not,
}

/// Operator families, one evaluator module each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    String,
    Numeric,
    Temporal,
    Array,
    Network,
    Boolean,
    Logical,
}

impl Operator {
    /// All operators, in registry order.
    pub const ALL: &'static [Operator] = &[
        Self::StringEquals,
        Self::StringNotEquals,
        Self::StringLike,
        Self::StringContains,
        Self::StringStartsWith,
        Self::StringEndsWith,
        Self::StringRegex,
        Self::NumericEquals,
        Self::NumericNotEquals,
        Self::NumericLessThan,
        Self::NumericLessThanEquals,
        Self::NumericGreaterThan,
        Self::NumericGreaterThanEquals,
        Self::NumericBetween,
        Self::DateLessThan,
        Self::DateLessThanEquals,
        Self::DateGreaterThan,
        Self::DateGreaterThanEquals,
        Self::DateBetween,
        Self::DayOfWeek,
        Self::TimeOfDay,
        Self::IsBusinessHours,
        Self::ArrayContains,
        Self::ArrayNotContains,
        Self::ArraySize,
        Self::IpInRange,
        Self::IpNotInRange,
        Self::IsInternalIp,
        Self::Bool,
        Self::And,
        Self::Or,
        Self::Not,
    ];

    /// Parse an operator name, ignoring ASCII case.
    ///
    /// `Time*` comparison names are accepted as aliases of the `Date*`
    /// operators, and `Boolean` as an alias of `Bool`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let op = match lower.as_str() {
            "stringequals" => Self::StringEquals,
            "stringnotequals" => Self::StringNotEquals,
            "stringlike" => Self::StringLike,
            "stringcontains" => Self::StringContains,
            "stringstartswith" => Self::StringStartsWith,
            "stringendswith" => Self::StringEndsWith,
            "stringregex" => Self::StringRegex,

            "numericequals" => Self::NumericEquals,
            "numericnotequals" => Self::NumericNotEquals,
            "numericlessthan" => Self::NumericLessThan,
            "numericlessthanequals" => Self::NumericLessThanEquals,
            "numericgreaterthan" => Self::NumericGreaterThan,
            "numericgreaterthanequals" => Self::NumericGreaterThanEquals,
            "numericbetween" => Self::NumericBetween,

            "datelessthan" | "timelessthan" => Self::DateLessThan,
            "datelessthanequals" | "timelessthanequals" => Self::DateLessThanEquals,
            "dategreaterthan" | "timegreaterthan" => Self::DateGreaterThan,
            "dategreaterthanequals" | "timegreaterthanequals" => Self::DateGreaterThanEquals,
            "datebetween" | "timebetween" => Self::DateBetween,
            "dayofweek" => Self::DayOfWeek,
            "timeofday" => Self::TimeOfDay,
            "isbusinesshours" => Self::IsBusinessHours,

            "arraycontains" => Self::ArrayContains,
            "arraynotcontains" => Self::ArrayNotContains,
            "arraysize" => Self::ArraySize,

            "ipinrange" => Self::IpInRange,
            "ipnotinrange" => Self::IpNotInRange,
            "isinternalip" => Self::IsInternalIp,

            "bool" | "boolean" => Self::Bool,

            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            _ => return None,
        };
        Some(op)
    }

    /// Canonical operator name as written in policy documents.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::StringEquals => "StringEquals",
            Self::StringNotEquals => "StringNotEquals",
            Self::StringLike => "StringLike",
            Self::StringContains => "StringContains",
            Self::StringStartsWith => "StringStartsWith",
            Self::StringEndsWith => "StringEndsWith",
            Self::StringRegex => "StringRegex",
            Self::NumericEquals => "NumericEquals",
            Self::NumericNotEquals => "NumericNotEquals",
            Self::NumericLessThan => "NumericLessThan",
            Self::NumericLessThanEquals => "NumericLessThanEquals",
            Self::NumericGreaterThan => "NumericGreaterThan",
            Self::NumericGreaterThanEquals => "NumericGreaterThanEquals",
            Self::NumericBetween => "NumericBetween",
            Self::DateLessThan => "DateLessThan",
            Self::DateLessThanEquals => "DateLessThanEquals",
            Self::DateGreaterThan => "DateGreaterThan",
            Self::DateGreaterThanEquals => "DateGreaterThanEquals",
            Self::DateBetween => "DateBetween",
            Self::DayOfWeek => "DayOfWeek",
            Self::TimeOfDay => "TimeOfDay",
            Self::IsBusinessHours => "IsBusinessHours",
            Self::ArrayContains => "ArrayContains",
            Self::ArrayNotContains => "ArrayNotContains",
            Self::ArraySize => "ArraySize",
            Self::IpInRange => "IPInRange",
            Self::IpNotInRange => "IPNotInRange",
            Self::IsInternalIp => "IsInternalIP",
            Self::Bool => "Bool",
            Self::And => "And",
            Self::Or => "Or",
            Self::Not => "Not",
        }
    }

    /// Family that evaluates this operator.
    #[must_use]
    pub fn family(self) -> OperatorFamily {
        match self {
            Self::StringEquals
            | Self::StringNotEquals
            | Self::StringLike
            | Self::StringContains
            | Self::StringStartsWith
            | Self::StringEndsWith
            | Self::StringRegex => OperatorFamily::String,

            Self::NumericEquals
            | Self::NumericNotEquals
            | Self::NumericLessThan
            | Self::NumericLessThanEquals
            | Self::NumericGreaterThan
            | Self::NumericGreaterThanEquals
            | Self::NumericBetween => OperatorFamily::Numeric,

            Self::DateLessThan
            | Self::DateLessThanEquals
            | Self::DateGreaterThan
            | Self::DateGreaterThanEquals
            | Self::DateBetween
            | Self::DayOfWeek
            | Self::TimeOfDay
            | Self::IsBusinessHours => OperatorFamily::Temporal,

            Self::ArrayContains | Self::ArrayNotContains | Self::ArraySize => {
                OperatorFamily::Array
            }

            Self::IpInRange | Self::IpNotInRange | Self::IsInternalIp => OperatorFamily::Network,

            Self::Bool => OperatorFamily::Boolean,

            Self::And | Self::Or | Self::Not => OperatorFamily::Logical,
        }
    }

    /// Returns `true` for `And`/`Or`/`Not`.
    #[must_use]
    pub fn is_logical(self) -> bool {
        self.family() == OperatorFamily::Logical
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

/// An operator name that is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown condition operator '{0}'")]
pub struct UnknownOperator(pub String);

// =============================================================================
// Condition Evaluator
// =============================================================================

/// Condition dispatcher.
///
/// Owns the compiled-regex cache and the configuration the operator
/// families need. A single instance is meant to be shared across
/// concurrent evaluations; the regex cache is the only mutable state.
#[derive(Debug)]
pub struct ConditionEvaluator {
    regex_cache: RegexCache,
    business_hours: BusinessHoursConfig,
    internal_networks: Vec<IpNetwork>,
    max_depth: usize,
    unknown_operator: UnknownOperatorBehavior,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new(&PdpConfig::default())
    }
}

impl ConditionEvaluator {
    /// Create an evaluator from the engine configuration.
    #[must_use]
    pub fn new(config: &PdpConfig) -> Self {
        Self {
            regex_cache: RegexCache::new(),
            business_hours: config.business_hours.clone(),
            internal_networks: config.internal_network_ranges(),
            max_depth: config.max_condition_depth,
            unknown_operator: config.unknown_operator,
        }
    }

    /// Evaluate a whole condition block against `context`.
    ///
    /// An empty block is satisfied.
    ///
    /// A block containing an unknown operator (when those fail closed) or
    /// nesting past the depth limit is indeterminate and not satisfied,
    /// even under a `Not`.
    #[must_use]
    pub fn evaluate(&self, block: &ConditionBlock, context: &ValueMap) -> bool {
        self.evaluate_block(block, context, 0).unwrap_or(false)
    }

    /// Evaluate one operator entry.
    #[must_use]
    pub fn evaluate_operator(&self, name: &str, payload: &Value, context: &ValueMap) -> bool {
        self.evaluate_entry(name, payload, context, 0)
            .unwrap_or(false)
    }

    /// The compiled-regex cache shared by `StringRegex` and `StringLike`.
    #[must_use]
    pub fn regex_cache(&self) -> &RegexCache {
        &self.regex_cache
    }

    /// Configured business-hours window.
    #[must_use]
    pub fn business_hours(&self) -> &BusinessHoursConfig {
        &self.business_hours
    }

    /// Parsed internal network table.
    #[must_use]
    pub fn internal_networks(&self) -> &[IpNetwork] {
        &self.internal_networks
    }

    /// Maximum nesting depth of logical nodes.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Implicit AND over the block; `None` when indeterminate.
    pub(crate) fn evaluate_block(
        &self,
        block: &ConditionBlock,
        context: &ValueMap,
        depth: usize,
    ) -> Option<bool> {
        all_of(
            block
                .iter()
                .map(|(name, payload)| self.evaluate_entry(name, payload, context, depth)),
        )
    }

    fn evaluate_entry(
        &self,
        name: &str,
        payload: &Value,
        context: &ValueMap,
        depth: usize,
    ) -> Option<bool> {
        let Some(op) = Operator::parse(name) else {
            let satisfied = self.unknown_operator == UnknownOperatorBehavior::Allow;
            tracing::warn!(
                operator = %name,
                satisfied,
                "Unknown condition operator"
            );
            return satisfied.then_some(true);
        };

        let result = match op.family() {
            OperatorFamily::String => string::evaluate(op, payload, context, &self.regex_cache),
            OperatorFamily::Numeric => numeric::evaluate(op, payload, context),
            OperatorFamily::Temporal => {
                temporal::evaluate(op, payload, context, &self.business_hours)
            }
            OperatorFamily::Array => array::evaluate(op, payload, context),
            OperatorFamily::Network => {
                network::evaluate(op, payload, context, &self.internal_networks)
            }
            OperatorFamily::Boolean => boolean::evaluate(payload, context),
            OperatorFamily::Logical => {
                return logical::evaluate(self, op, payload, context, depth);
            }
        };

        tracing::trace!(operator = %op, result, "Condition operator evaluated");
        Some(result)
    }
}

/// AND over three-valued results: any `false` wins, then any `None`.
pub(crate) fn all_of(results: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut indeterminate = false;
    for result in results {
        match result {
            Some(false) => return Some(false),
            Some(true) => {}
            None => indeterminate = true,
        }
    }
    (!indeterminate).then_some(true)
}

/// OR over three-valued results: any `true` wins, then any `None`.
pub(crate) fn any_of(results: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut indeterminate = false;
    for result in results {
        match result {
            Some(true) => return Some(true),
            Some(false) => {}
            None => indeterminate = true,
        }
    }
    (!indeterminate).then_some(false)
}

/// Deepest `And`/`Or`/`Not` nesting in `block`; 0 for a block of leaves.
#[must_use]
pub fn condition_depth(block: &ConditionBlock) -> usize {
    block
        .iter()
        .filter(|(name, _)| Operator::parse(name).is_some_and(Operator::is_logical))
        .map(|(_, payload)| {
            let children = match payload {
                Value::Map(child) => condition_depth(child),
                Value::Seq(nodes) => nodes
                    .iter()
                    .filter_map(Value::as_map)
                    .map(condition_depth)
                    .max()
                    .unwrap_or(0),
                _ => 0,
            };
            children + 1
        })
        .max()
        .unwrap_or(0)
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Apply `check` to every `path → expected` pair of a leaf payload.
///
/// All pairs must pass. A payload that is not a map fails.
pub(crate) fn all_paths<F>(payload: &Value, context: &ValueMap, mut check: F) -> bool
where
    F: FnMut(&Value, &Value) -> bool,
{
    let Some(entries) = payload.as_map() else {
        tracing::debug!("Condition payload is not a map");
        return false;
    };
    entries
        .iter()
        .all(|(attr, expected)| check(path::resolve_or_absent(context, attr), expected))
}

/// Unpack a `[low, high]` or `{min, max}` range.
pub(crate) fn range_bounds(expected: &Value) -> Option<(&Value, &Value)> {
    match expected {
        Value::Seq(items) if items.len() == 2 => Some((&items[0], &items[1])),
        Value::Map(map) => Some((map.get("min")?, map.get("max")?)),
        _ => None,
    }
}

/// Collect operator names in `block` (recursively) that are not registered.
#[must_use]
pub fn unknown_operators(block: &ConditionBlock) -> Vec<String> {
    let mut unknown = Vec::new();
    collect_unknown(block, &mut unknown);
    unknown
}

fn collect_unknown(block: &ConditionBlock, out: &mut Vec<String>) {
    for (name, payload) in block {
        match Operator::parse(name) {
            None => out.push(name.clone()),
            Some(op) if op.is_logical() => match payload {
                Value::Map(child) => collect_unknown(child, out),
                Value::Seq(children) => children
                    .iter()
                    .filter_map(Value::as_map)
                    .for_each(|child| collect_unknown(child, out)),
                _ => {}
            },
            Some(_) => {}
        }
    }
}
