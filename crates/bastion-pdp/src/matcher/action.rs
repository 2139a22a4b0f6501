//! Action pattern matching.
//!
//! Actions are colon-delimited (`service:type:operation`). Matching is
//! segment by segment: `*` matches any one segment, anything else must be
//! equal, and both sides must have the same number of segments. A bare
//! `*` pattern matches every action.

/// Returns `true` if `action` matches `pattern`.
#[must_use]
pub fn matches(pattern: &str, action: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let mut pattern_segments = pattern.split(':');
    let mut action_segments = action.split(':');

    loop {
        match (pattern_segments.next(), action_segments.next()) {
            (Some(p), Some(a)) => {
                if p != "*" && p != a {
                    return false;
                }
            }
            (None, None) => return true,
            // segment counts differ
            _ => return false,
        }
    }
}

/// Returns `true` if any pattern matches `action`.
#[must_use]
pub fn matches_any<S: AsRef<str>>(patterns: &[S], action: &str) -> bool {
    patterns.iter().any(|p| matches(p.as_ref(), action))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact() {
        assert!(matches(
            "document-service:file:read",
            "document-service:file:read"
        ));
        assert!(!matches(
            "document-service:file:read",
            "document-service:file:write"
        ));
    }

    #[test]
    fn test_trailing_wildcard_segment() {
        let pattern = "document-service:file:*";
        assert!(matches(pattern, "document-service:file:read"));
        assert!(matches(pattern, "document-service:file:write"));
        assert!(!matches(pattern, "payment-service:file:read"));
    }

    #[test]
    fn test_inner_wildcard_segment() {
        assert!(matches("*:file:read", "document-service:file:read"));
        assert!(matches("document-service:*:read", "document-service:folder:read"));
        assert!(!matches("document-service:*:read", "document-service:folder:delete"));
    }

    #[test]
    fn test_segment_count_must_match() {
        assert!(!matches("document-service:*", "document-service:file:read"));
        assert!(!matches("document-service:file:*", "document-service:file"));
        assert!(!matches("*:*", "a:b:c"));
    }

    #[test]
    fn test_global_wildcard() {
        assert!(matches("*", "document-service:file:read"));
        assert!(matches("*", "anything"));
        assert!(matches("*", ""));
    }

    #[test]
    fn test_no_partial_segment_wildcards() {
        assert!(!matches("document-service:file:re*", "document-service:file:read"));
    }

    #[test]
    fn test_matches_any() {
        let patterns = ["billing:*:read", "document-service:file:*"];
        assert!(matches_any(&patterns, "document-service:file:delete"));
        assert!(!matches_any(&patterns, "billing:invoice:write"));
        assert!(!matches_any::<&str>(&[], "billing:invoice:read"));
    }
}
