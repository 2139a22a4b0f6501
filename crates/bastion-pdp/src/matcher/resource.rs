//! Resource pattern matching.
//!
//! Resource identifiers are `/`-separated components made of `:`-separated
//! segments, e.g. `api:documents:owner-42/attachments:*`. A pattern
//! matches when, after `${namespace:attribute}` substitution from the
//! working context, it is:
//!
//! - a lone `*`,
//! - exactly equal to the resource, or
//! - component-by-component and segment-by-segment equal, where a `*`
//!   component or segment matches anything and a segment ending in `*`
//!   matches by prefix.
//!
//! An unresolved variable is replaced with the empty string. Substituted
//! text is literal: when an attribute value contains `*`, the pattern only
//! matches a resource that equals the substituted text exactly, so a
//! subject id of `*` cannot widen `owner-${request:UserId}` to every owner.

use std::borrow::Cow;

use crate::path;
use crate::value::ValueMap;

/// Returns `true` if `resource` matches `pattern` in `context`.
#[must_use]
pub fn matches(pattern: &str, resource: &str, context: &ValueMap) -> bool {
    let (pattern, injected_wildcard) = substitute(pattern, context);

    if pattern == resource {
        return true;
    }
    if injected_wildcard {
        tracing::debug!(
            pattern = %pattern,
            "Attribute value contains a wildcard, matching literally"
        );
        return false;
    }
    if pattern == "*" {
        return true;
    }

    let mut pattern_components = pattern.split('/');
    let mut resource_components = resource.split('/');

    loop {
        match (pattern_components.next(), resource_components.next()) {
            (Some(p), Some(r)) => {
                if !component_matches(p, r) {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Returns `true` if any pattern matches `resource`.
#[must_use]
pub fn matches_any<S: AsRef<str>>(patterns: &[S], resource: &str, context: &ValueMap) -> bool {
    patterns
        .iter()
        .any(|p| matches(p.as_ref(), resource, context))
}

fn component_matches(pattern: &str, component: &str) -> bool {
    if pattern == "*" || pattern == component {
        return true;
    }

    let pattern_segments: Vec<&str> = pattern.split(':').collect();
    let segments: Vec<&str> = component.split(':').collect();
    if pattern_segments.len() != segments.len() {
        return false;
    }

    pattern_segments
        .iter()
        .zip(&segments)
        .all(|(p, s)| segment_matches(p, s))
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some("") => true,
        Some(prefix) => segment.starts_with(prefix),
        None => pattern == segment,
    }
}

/// Replace every `${namespace:attribute}` in `pattern` with the string
/// form of the context value at that key.
///
/// Missing values become the empty string. An unterminated `${` is kept
/// literally.
#[must_use]
pub fn substitute_variables<'a>(pattern: &'a str, context: &ValueMap) -> Cow<'a, str> {
    substitute(pattern, context).0
}

/// Substitution plus whether any substituted value contained `*`.
fn substitute<'a>(pattern: &'a str, context: &ValueMap) -> (Cow<'a, str>, bool) {
    if !pattern.contains("${") {
        return (Cow::Borrowed(pattern), false);
    }

    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    let mut injected_wildcard = false;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return (Cow::Owned(out), injected_wildcard);
        };

        let key = after[..end].trim();
        match path::resolve(context, key) {
            Some(value) => {
                let text = value.to_string();
                injected_wildcard |= text.contains('*');
                out.push_str(&text);
            }
            None => {
                tracing::debug!(variable = %key, "Unresolved resource pattern variable");
            }
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    (Cow::Owned(out), injected_wildcard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    fn ctx() -> ValueMap {
        match Value::from(json!({
            "request:UserId": "user-123",
            "user:Department": "engineering",
            "user": { "tenant": "acme" }
        })) {
            Value::Map(map) => map,
            _ => unreachable!(),
        }
    }

    // -------------------------------------------------------------------------
    // Matching Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_exact_and_global_wildcard() {
        let ctx = ctx();
        assert!(matches("api:documents:1", "api:documents:1", &ctx));
        assert!(!matches("api:documents:1", "api:documents:2", &ctx));
        assert!(matches("*", "api:documents:1/attachments:9", &ctx));
    }

    #[test]
    fn test_segment_wildcards() {
        let ctx = ctx();
        assert!(matches("api:documents:*", "api:documents:42", &ctx));
        assert!(matches("api:*:42", "api:reports:42", &ctx));
        assert!(!matches("api:documents:*", "api:reports:42", &ctx));
        assert!(!matches("api:documents:*", "api:documents:42:v2", &ctx));
    }

    #[test]
    fn test_prefix_wildcards() {
        let ctx = ctx();
        assert!(matches("api:users:admin-*", "api:users:admin-root", &ctx));
        assert!(matches("api:users:admin-*", "api:users:admin-", &ctx));
        assert!(!matches("api:users:admin-*", "api:users:guest-1", &ctx));
    }

    #[test]
    fn test_hierarchical_components() {
        let ctx = ctx();
        assert!(matches(
            "api:documents:*/attachments:*",
            "api:documents:7/attachments:3",
            &ctx
        ));
        assert!(matches("api:documents:7/*", "api:documents:7/comments:1:2", &ctx));
        assert!(!matches(
            "api:documents:*/attachments:*",
            "api:documents:7/comments:3",
            &ctx
        ));
        assert!(!matches("api:documents:*", "api:documents:7/attachments:3", &ctx));
    }

    #[test]
    fn test_variable_substitution() {
        let ctx = ctx();
        assert!(matches(
            "api:documents:owner-${request:UserId}",
            "api:documents:owner-user-123",
            &ctx
        ));
        assert!(!matches(
            "api:documents:owner-${request:UserId}",
            "api:documents:owner-user-999",
            &ctx
        ));
        assert!(matches(
            "tenants:${user.tenant}/reports:${user:Department}-*",
            "tenants:acme/reports:engineering-q3",
            &ctx
        ));
    }

    #[test]
    fn test_unresolved_variable_becomes_empty() {
        let ctx = ctx();
        assert_eq!(
            substitute_variables("api:documents:owner-${request:Missing}", &ctx),
            "api:documents:owner-"
        );
        assert!(matches(
            "api:documents:owner-${request:Missing}",
            "api:documents:owner-",
            &ctx
        ));
        assert!(!matches(
            "api:documents:owner-${request:Missing}",
            "api:documents:owner-user-123",
            &ctx
        ));
    }

    #[test]
    fn test_substituted_wildcard_is_literal() {
        let ctx = match Value::from(json!({
            "request:UserId": "*",
            "user:Prefix": "adm*"
        })) {
            Value::Map(map) => map,
            _ => unreachable!(),
        };

        assert!(!matches(
            "api:documents:owner-${request:UserId}",
            "api:documents:owner-user-123",
            &ctx
        ));
        assert!(matches(
            "api:documents:owner-${request:UserId}",
            "api:documents:owner-*",
            &ctx
        ));
        assert!(!matches("${request:UserId}", "api:documents:1", &ctx));
        assert!(!matches("api:users:${user:Prefix}", "api:users:admin", &ctx));
    }

    #[test]
    fn test_unterminated_variable_kept() {
        let ctx = ctx();
        assert_eq!(
            substitute_variables("api:${request:UserId", &ctx),
            "api:${request:UserId"
        );
        assert!(matches!(
            substitute_variables("api:plain", &ctx),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_matches_any() {
        let ctx = ctx();
        let patterns = vec!["api:reports:*".to_string(), "api:documents:*".to_string()];
        assert!(matches_any(&patterns, "api:documents:1", &ctx));
        assert!(!matches_any(&patterns, "api:users:1", &ctx));
    }
}
