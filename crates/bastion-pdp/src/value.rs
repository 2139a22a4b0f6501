//! Dynamic attribute values.
//!
//! Attributes arrive from heterogeneous sources (policy JSON, enrichment
//! output, caller context), so every comparison goes through one closed
//! [`Value`] variant and four total conversions:
//!
//! | conversion        | failure result          |
//! |-------------------|-------------------------|
//! | [`Value::to_string`] (via `Display`) | `""` for absent |
//! | [`Value::to_number`] | `0.0`                 |
//! | [`Value::to_bool`]   | `false`               |
//! | [`Value::to_time`]   | [`ZERO_TIME`]         |
//!
//! None of them panic or return errors. Operators that must treat an
//! unparseable timestamp as a non-match use [`Value::parse_time`] instead.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::{date, datetime, format_description};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

/// Timestamp returned by [`Value::to_time`] when nothing parses.
pub const ZERO_TIME: OffsetDateTime = datetime!(0001-01-01 0:00 UTC);

/// Date used for clock-only values such as `"14:30"`.
const CLOCK_DATE: Date = date!(0001-01-01);

/// Ordered map type used for structured values.
pub type ValueMap = IndexMap<String, Value>;

// =============================================================================
// Value
// =============================================================================

/// A JSON-like attribute value with an explicit "absent" state.
///
/// JSON `null` deserializes to [`Value::Absent`], so a `null` attribute and
/// a missing attribute behave identically during evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    /// No value (missing attribute or JSON null).
    #[default]
    Absent,
    /// Boolean.
    Bool(bool),
    /// Any numeric value.
    Number(f64),
    /// Text.
    String(String),
    /// Native timestamp.
    Time(OffsetDateTime),
    /// Ordered sequence.
    Seq(Vec<Value>),
    /// String-keyed map, insertion ordered.
    Map(ValueMap),
}

impl Value {
    /// Returns `true` for [`Value::Absent`].
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Borrow the text of a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the elements of a [`Value::Seq`].
    #[must_use]
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the entries of a [`Value::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key in a [`Value::Map`].
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// View any value as a sequence.
    ///
    /// Sequences are returned as-is, absent values as an empty slice and
    /// every other value as a single-element slice.
    #[must_use]
    pub fn as_elements(&self) -> &[Value] {
        match self {
            Self::Seq(items) => items,
            Self::Absent => &[],
            other => std::slice::from_ref(other),
        }
    }

    /// Numeric view: numbers pass through, strings parse as decimal floats,
    /// everything else (including unparseable strings) is `0.0`.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::String(s) => s.parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Truthiness: native booleans pass through, strings equal to `true` or
    /// `1` (case-insensitive) are true, non-zero numbers are true.
    #[must_use]
    pub fn to_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::String(s) => s.eq_ignore_ascii_case("true") || s == "1",
            Self::Number(n) => *n != 0.0,
            _ => false,
        }
    }

    /// Timestamp view; [`ZERO_TIME`] when the value is not a time.
    #[must_use]
    pub fn to_time(&self) -> OffsetDateTime {
        self.parse_time().unwrap_or(ZERO_TIME)
    }

    /// Fallible timestamp view used by comparison operators.
    ///
    /// Strings are tried against, in order: RFC 3339, ISO-8601 with a `Z`
    /// suffix, `YYYY-MM-DD HH:MM:SS`, `HH:MM` and `YYYY-MM-DD`. Values
    /// without an offset are taken as UTC.
    #[must_use]
    pub fn parse_time(&self) -> Option<OffsetDateTime> {
        match self {
            Self::Time(t) => Some(*t),
            Self::String(s) => parse_timestamp(s),
            _ => None,
        }
    }
}

fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(t);
    }
    if let Ok(t) = PrimitiveDateTime::parse(
        s,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"),
    ) {
        return Some(t.assume_utc());
    }
    if let Ok(t) = PrimitiveDateTime::parse(
        s,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Some(t.assume_utc());
    }
    if let Ok(t) = Time::parse(s, format_description!("[hour]:[minute]")) {
        return Some(PrimitiveDateTime::new(CLOCK_DATE, t).assume_utc());
    }
    if let Ok(d) = Date::parse(s, format_description!("[year]-[month]-[day]")) {
        return Some(d.midnight().assume_utc());
    }
    None
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    /// Renders the value the way string operators compare it: strings
    /// verbatim, integral numbers without a fraction, absent as `""`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::Time(t) => match t.format(&Rfc3339) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{t}"),
            },
            Self::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("map[")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Absent,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Seq(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Absent => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
                    Self::from(n as i64)
                } else {
                    serde_json::Number::from_f64(n).map_or(Self::Null, Self::Number)
                }
            }
            Value::String(s) => Self::String(s),
            Value::Time(t) => Self::String(Value::Time(t).to_string()),
            Value::Seq(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Map(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Self::Time(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Seq(value)
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

// =============================================================================
// Tests
// =============================================================================
