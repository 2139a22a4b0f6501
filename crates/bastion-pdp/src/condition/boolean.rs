//! `Bool` / `Boolean`: compares `to_bool` of both sides.

use super::all_paths;
use crate::value::{Value, ValueMap};

pub(crate) fn evaluate(payload: &Value, context: &ValueMap) -> bool {
    all_paths(payload, context, |actual, expected| {
        actual.to_bool() == expected.to_bool()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(payload: serde_json::Value) -> bool {
        let ctx = match Value::from(json!({
            "user": { "mfa": true, "verified": "TRUE", "locked": 0, "flag": "yes" }
        })) {
            Value::Map(map) => map,
            _ => unreachable!(),
        };
        evaluate(&Value::from(payload), &ctx)
    }

    #[test]
    fn test_bool_values() {
        assert!(eval(json!({ "user.mfa": true })));
        assert!(eval(json!({ "user.verified": "true" })));
        assert!(eval(json!({ "user.locked": false })));
        assert!(!eval(json!({ "user.mfa": false })));
    }

    #[test]
    fn test_non_truthy_strings_are_false() {
        assert!(eval(json!({ "user.flag": false })));
        assert!(eval(json!({ "user.missing": false })));
        assert!(!eval(json!({ "user.missing": true })));
    }
}
