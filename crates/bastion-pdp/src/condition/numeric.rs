//! Numeric operators. Both sides go through `to_number`.

use super::{Operator, all_paths, range_bounds};
use crate::value::{Value, ValueMap};

pub(crate) fn evaluate(op: Operator, payload: &Value, context: &ValueMap) -> bool {
    all_paths(payload, context, |actual, expected| {
        let actual = actual.to_number();

        if op == Operator::NumericBetween {
            return match range_bounds(expected) {
                Some((min, max)) => actual >= min.to_number() && actual <= max.to_number(),
                None => false,
            };
        }

        let mut candidates = expected.as_elements().iter().map(Value::to_number);
        match op {
            Operator::NumericNotEquals => candidates.all(|e| actual != e),
            _ => candidates.any(|e| compare(op, actual, e)),
        }
    })
}

fn compare(op: Operator, actual: f64, expected: f64) -> bool {
    match op {
        Operator::NumericEquals => actual == expected,
        Operator::NumericLessThan => actual < expected,
        Operator::NumericLessThanEquals => actual <= expected,
        Operator::NumericGreaterThan => actual > expected,
        Operator::NumericGreaterThanEquals => actual >= expected,
        _ => false,
    }
}
