//! String operators.
//!
//! Both sides are compared through their string rendering. When the
//! expected value is a sequence, positive operators pass if any element
//! matches and `StringNotEquals` passes only if no element is equal.

use dashmap::DashMap;
use regex::Regex;

use super::{Operator, all_paths};
use crate::value::{Value, ValueMap};

pub(crate) fn evaluate(
    op: Operator,
    payload: &Value,
    context: &ValueMap,
    regexes: &RegexCache,
) -> bool {
    all_paths(payload, context, |actual, expected| {
        let actual = actual.to_string();
        let mut candidates = expected.as_elements().iter().map(Value::to_string);

        match op {
            Operator::StringNotEquals => candidates.all(|e| actual != e),
            _ => candidates.any(|e| matches_one(op, &actual, &e, regexes)),
        }
    })
}

fn matches_one(op: Operator, actual: &str, expected: &str, regexes: &RegexCache) -> bool {
    match op {
        Operator::StringEquals => actual == expected,
        Operator::StringContains => actual.contains(expected),
        Operator::StringStartsWith => actual.starts_with(expected),
        Operator::StringEndsWith => actual.ends_with(expected),
        Operator::StringLike => regexes.is_match(&like_to_regex(expected), actual),
        Operator::StringRegex => regexes.is_match(expected, actual),
        _ => false,
    }
}

/// Rewrite a SQL `LIKE` pattern into an anchored regex.
///
/// `%` matches any run of characters, `_` exactly one; everything else is
/// literal.
#[must_use]
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut literal = String::new();

    for ch in pattern.chars() {
        match ch {
            '%' | '_' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '%' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

// =============================================================================
// Regex Cache
// =============================================================================

/// Concurrent cache of compiled patterns keyed by pattern text.
///
/// Entries live until the cache is cleared or dropped. Patterns that fail
/// to compile are not cached and never match.
#[derive(Debug, Default)]
pub struct RegexCache {
    entries: DashMap<String, Regex>,
}

impl RegexCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a compiled pattern, compiling and caching it on first use.
    pub fn get_or_compile(&self, pattern: &str) -> Option<Regex> {
        if let Some(re) = self.entries.get(pattern) {
            return Some(re.value().clone());
        }

        match Regex::new(pattern) {
            Ok(re) => {
                self.entries.insert(pattern.to_string(), re.clone());
                Some(re)
            }
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "Invalid regex in condition");
                None
            }
        }
    }

    /// Returns `true` if `pattern` compiles and matches `haystack`.
    pub fn is_match(&self, pattern: &str, haystack: &str) -> bool {
        self.get_or_compile(pattern)
            .is_some_and(|re| re.is_match(haystack))
    }

    /// Number of cached patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached pattern.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx() -> ValueMap {
        match Value::from(json!({
            "user": {
                "email": "john@company.com",
                "name": "John Smith",
                "department": "engineering"
            },
            "request:Action": "document-service:file:read"
        })) {
            Value::Map(map) => map,
            _ => unreachable!(),
        }
    }

    fn eval(op: Operator, payload: serde_json::Value) -> bool {
        evaluate(op, &Value::from(payload), &ctx(), &RegexCache::new())
    }

    #[test]
    fn test_equals_and_not_equals() {
        assert!(eval(
            Operator::StringEquals,
            json!({ "user.department": "engineering" })
        ));
        assert!(!eval(Operator::StringEquals, json!({ "user.department": "sales" })));
        assert!(eval(Operator::StringNotEquals, json!({ "user.department": "sales" })));
        assert!(!eval(
            Operator::StringNotEquals,
            json!({ "user.department": "engineering" })
        ));
    }

    #[test]
    fn test_expected_set() {
        assert!(eval(
            Operator::StringEquals,
            json!({ "user.department": ["sales", "engineering"] })
        ));
        assert!(!eval(
            Operator::StringNotEquals,
            json!({ "user.department": ["sales", "engineering"] })
        ));
        assert!(eval(
            Operator::StringNotEquals,
            json!({ "user.department": ["sales", "legal"] })
        ));
    }

    #[test]
    fn test_every_path_must_match() {
        assert!(!eval(
            Operator::StringEquals,
            json!({ "user.department": "engineering", "user.name": "Jane" })
        ));
    }

    #[test]
    fn test_missing_attribute_is_empty_string() {
        assert!(!eval(Operator::StringEquals, json!({ "user.title": "cto" })));
        assert!(eval(Operator::StringEquals, json!({ "user.title": "" })));
    }

    #[test]
    fn test_like() {
        assert!(eval(
            Operator::StringLike,
            json!({ "user.email": "%@company.com" })
        ));
        let external = match Value::from(json!({ "user": { "email": "john@external.com" } })) {
            Value::Map(map) => map,
            _ => unreachable!(),
        };
        let payload = Value::from(json!({ "user.email": "%@company.com" }));
        assert!(!evaluate(
            Operator::StringLike,
            &payload,
            &external,
            &RegexCache::new()
        ));
        assert!(eval(Operator::StringLike, json!({ "user.name": "J_hn%" })));
        assert!(!eval(Operator::StringLike, json!({ "user.name": "J_hn" })));
    }

    #[test]
    fn test_like_escapes_metacharacters() {
        assert_eq!(like_to_regex("a.b%"), "(?s)^a\\.b.*$");
        assert!(!eval(Operator::StringLike, json!({ "user.email": "john@company.c.m" })));
    }

    #[test]
    fn test_contains_prefix_suffix() {
        assert!(eval(Operator::StringContains, json!({ "user.name": "Smi" })));
        assert!(eval(Operator::StringStartsWith, json!({ "user.name": "John" })));
        assert!(eval(Operator::StringEndsWith, json!({ "user.name": "Smith" })));
        assert!(!eval(Operator::StringEndsWith, json!({ "user.name": "John" })));
    }

    #[test]
    fn test_regex_and_cache() {
        let cache = RegexCache::new();
        let payload = Value::from(json!({ "request:Action": "^document-service:file:(read|list)$" }));
        assert!(evaluate(Operator::StringRegex, &payload, &ctx(), &cache));
        assert!(evaluate(Operator::StringRegex, &payload, &ctx(), &cache));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalid_regex_is_non_match() {
        let cache = RegexCache::new();
        let payload = Value::from(json!({ "user.name": "(unclosed" }));
        assert!(!evaluate(Operator::StringRegex, &payload, &ctx(), &cache));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_regex_cache_shared_across_threads() {
        let cache = Arc::new(RegexCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let pattern = format!("^item-{}$", i % 4);
                    cache.is_match(&pattern, &format!("item-{}", i % 4))
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.len(), 4);
    }
}
