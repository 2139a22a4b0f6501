//! Array operators.
//!
//! A non-sequence actual value counts as a one-element sequence and an
//! absent one as empty. Elements compare by their string rendering.

use super::{Operator, all_paths};
use crate::value::{Value, ValueMap};

pub(crate) fn evaluate(op: Operator, payload: &Value, context: &ValueMap) -> bool {
    all_paths(payload, context, |actual, expected| {
        let items = actual.as_elements();
        match op {
            Operator::ArrayContains => contains_any(items, expected),
            Operator::ArrayNotContains => !contains_any(items, expected),
            Operator::ArraySize => size_matches(items.len(), expected),
            _ => false,
        }
    })
}

fn contains_any(items: &[Value], expected: &Value) -> bool {
    let rendered: Vec<String> = items.iter().map(Value::to_string).collect();
    expected
        .as_elements()
        .iter()
        .any(|e| rendered.contains(&e.to_string()))
}

/// A bare number is an exact size; a map applies every listed comparison.
fn size_matches(len: usize, expected: &Value) -> bool {
    let len = len as f64;
    match expected {
        Value::Number(n) => len == *n,
        Value::String(_) => expected.to_string().trim().parse::<f64>().is_ok_and(|n| len == n),
        Value::Map(bounds) if !bounds.is_empty() => bounds.iter().all(|(key, bound)| {
            let bound = bound.to_number();
            match key.as_str() {
                "eq" | "equals" => len == bound,
                "gt" | "greater_than" => len > bound,
                "gte" | "greater_than_or_equal" => len >= bound,
                "lt" | "less_than" => len < bound,
                "lte" | "less_than_or_equal" => len <= bound,
                other => {
                    tracing::debug!(key = %other, "Unknown ArraySize comparison");
                    false
                }
            }
        }),
        _ => false,
    }
}
