//! Attribute path resolution.
//!
//! A path names one value in the working evaluation context. Resolution
//! tries, cheapest first:
//!
//! 1. a direct key hit (`"user:Department"`, `"request:Action"`),
//! 2. dotted traversal through nested maps (`"user.profile.department"`),
//! 3. bracket or numeric indexing into sequences (`"user.roles[0]"`,
//!    `"user.roles.0"`).
//!
//! A path that cannot be resolved is reported as `None`, never as an
//! error. Callers convert absence into the zero value of the category they
//! compare in.

use crate::value::{Value, ValueMap};

/// Resolve `path` against `context`.
///
/// Returns `None` when any step of the path is missing or malformed.
#[must_use]
pub fn resolve<'a>(context: &'a ValueMap, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    if let Some(value) = context.get(path) {
        return Some(value);
    }

    if !path.contains('.') && !path.contains('[') {
        return None;
    }

    let segments = parse_segments(path)?;
    let (first, rest) = segments.split_first()?;
    let Segment::Key(root) = first else {
        return None;
    };

    let mut current = context.get(*root)?;
    for segment in rest {
        current = step(current, segment)?;
    }
    Some(current)
}

/// Resolve `path`, mapping a miss to [`Value::Absent`].
#[must_use]
pub fn resolve_or_absent<'a>(context: &'a ValueMap, path: &str) -> &'a Value {
    const ABSENT: &Value = &Value::Absent;
    resolve(context, path).unwrap_or(ABSENT)
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'p> {
    Key(&'p str),
    Index(usize),
}

fn step<'a>(current: &'a Value, segment: &Segment<'_>) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Map(map), Segment::Key(key)) => map.get(*key),
        (Value::Seq(items), Segment::Index(idx)) => items.get(*idx),
        // `roles.0` addresses a sequence element without brackets
        (Value::Seq(items), Segment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|idx| items.get(idx))
        }
        _ => None,
    }
}

/// Split `a.b[0].c` into `[Key(a), Key(b), Index(0), Key(c)]`.
///
/// Returns `None` for empty segments or unbalanced/non-numeric brackets.
fn parse_segments(path: &str) -> Option<Vec<Segment<'_>>> {
    let mut segments = Vec::new();

    for part in path.split('.') {
        let (key, mut brackets) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if key.is_empty() && brackets.is_empty() {
            return None;
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }

        while !brackets.is_empty() {
            let inner = brackets.strip_prefix('[')?;
            let close = inner.find(']')?;
            let idx = inner[..close].trim().parse::<usize>().ok()?;
            segments.push(Segment::Index(idx));
            brackets = &inner[close + 1..];
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}
