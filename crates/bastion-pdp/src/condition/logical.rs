//! Logical composition: `And`, `Or`, `Not`.
//!
//! Children are whole condition blocks and re-enter the dispatcher, so an
//! `Or` child can itself hold several operators (implicitly AND-ed) or
//! further logical nodes. Nesting deeper than the configured limit is
//! indeterminate, and so is everything above it, including a `Not`.

use super::{ConditionEvaluator, Operator, all_of, any_of};
use crate::value::{Value, ValueMap};

pub(crate) fn evaluate(
    evaluator: &ConditionEvaluator,
    op: Operator,
    payload: &Value,
    context: &ValueMap,
    depth: usize,
) -> Option<bool> {
    let depth = depth + 1;
    if depth > evaluator.max_depth() {
        tracing::warn!(
            operator = %op,
            max_depth = evaluator.max_depth(),
            "Condition nesting limit exceeded"
        );
        return None;
    }

    let child = |node: &Value| match node.as_map() {
        Some(block) => evaluator.evaluate_block(block, context, depth),
        None => Some(false),
    };

    match op {
        // An empty And holds and an empty Or fails
        Operator::And => match payload.as_seq() {
            Some(nodes) => all_of(nodes.iter().map(child)),
            None => Some(false),
        },
        Operator::Or => match payload.as_seq() {
            Some(nodes) => any_of(nodes.iter().map(child)),
            None => Some(false),
        },
        // Negation keeps an indeterminate child indeterminate
        Operator::Not => match payload.as_map() {
            Some(_) => child(payload).map(|satisfied| !satisfied),
            None => Some(false),
        },
        _ => Some(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdpConfig;
    use serde_json::json;

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn map(value: serde_json::Value) -> ValueMap {
        match Value::from(value) {
            Value::Map(map) => map,
            _ => unreachable!(),
        }
    }

    fn ctx() -> ValueMap {
        map(json!({
            "user": { "department": "engineering", "level": 4, "mfa": true },
            "environment": { "client_ip": "10.1.2.3" }
        }))
    }

    fn check(block: serde_json::Value) -> bool {
        ConditionEvaluator::default().evaluate(&map(block), &ctx())
    }

    /// `Not` wrapped `levels` times around a satisfied leaf.
    fn nested_not(levels: usize) -> serde_json::Value {
        let mut node = json!({ "Bool": { "user.mfa": true } });
        for _ in 0..levels {
            node = json!({ "Not": node });
        }
        node
    }

    // -------------------------------------------------------------------------
    // And / Or / Not
    // -------------------------------------------------------------------------

    #[test]
    fn test_and() {
        assert!(check(json!({
            "And": [
                { "StringEquals": { "user.department": "engineering" } },
                { "NumericGreaterThan": { "user.level": 3 } }
            ]
        })));
        assert!(!check(json!({
            "And": [
                { "StringEquals": { "user.department": "engineering" } },
                { "NumericGreaterThan": { "user.level": 9 } }
            ]
        })));
        assert!(check(json!({ "And": [] })));
    }

    #[test]
    fn test_or() {
        assert!(check(json!({
            "Or": [
                { "StringEquals": { "user.department": "sales" } },
                { "IPInRange": { "environment.client_ip": "10.0.0.0/8" } }
            ]
        })));
        assert!(!check(json!({
            "Or": [
                { "StringEquals": { "user.department": "sales" } },
                { "Bool": { "user.mfa": false } }
            ]
        })));
        assert!(!check(json!({ "Or": [] })));
    }

    #[test]
    fn test_not() {
        assert!(check(json!({ "Not": { "StringEquals": { "user.department": "sales" } } })));
        assert!(!check(json!({ "Not": { "Bool": { "user.mfa": true } } })));
    }

    #[test]
    fn test_malformed_logical_payloads() {
        assert!(!check(json!({ "And": { "Bool": { "user.mfa": true } } })));
        assert!(!check(json!({ "Or": "yes" })));
        assert!(!check(json!({ "Or": ["not-a-map"] })));
        assert!(!check(json!({ "Not": [{ "Bool": { "user.mfa": false } }] })));
    }

    #[test]
    fn test_child_block_is_implicit_and() {
        assert!(!check(json!({
            "Or": [
                {
                    "StringEquals": { "user.department": "engineering" },
                    "NumericGreaterThan": { "user.level": 9 }
                }
            ]
        })));
    }

    #[test]
    fn test_nested_composition() {
        assert!(check(json!({
            "And": [
                { "Or": [
                    { "StringEquals": { "user.department": "sales" } },
                    { "Not": { "Bool": { "user.mfa": false } } }
                ] },
                { "NumericBetween": { "user.level": [1, 5] } }
            ]
        })));
    }

    #[test]
    fn test_depth_limit() {
        let config = PdpConfig {
            max_condition_depth: 4,
            ..Default::default()
        };
        let evaluator = ConditionEvaluator::new(&config);

        // Even levels cancel out, so a satisfied leaf stays satisfied
        assert!(evaluator.evaluate(&map(nested_not(4)), &ctx()));
        assert!(!evaluator.evaluate(&map(nested_not(6)), &ctx()));
    }

    #[test]
    fn test_depth_limit_under_odd_negation_fails() {
        let config = PdpConfig {
            max_condition_depth: 3,
            ..Default::default()
        };
        let evaluator = ConditionEvaluator::new(&config);

        // Three Nots over the cut-off fourth must not turn it into a pass
        assert!(!evaluator.evaluate(&map(nested_not(4)), &ctx()));
        assert!(!evaluator.evaluate(
            &map(json!({ "Or": [ nested_not(4), { "Bool": { "user.mfa": false } } ] })),
            &ctx()
        ));
        assert!(evaluator.evaluate(
            &map(json!({ "Or": [ nested_not(4), { "Bool": { "user.mfa": true } } ] })),
            &ctx()
        ));
    }
}
