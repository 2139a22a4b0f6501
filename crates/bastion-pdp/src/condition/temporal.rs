//! Temporal operators.
//!
//! `Date*` comparisons parse both sides as timestamps; if either side does
//! not parse the leaf fails. An absent attribute fails too rather than
//! comparing as the zero time. `DayOfWeek`, `TimeOfDay` and
//! `IsBusinessHours` look only at the weekday or clock component.

use std::cmp::Ordering;

use time::{OffsetDateTime, Weekday};

use super::{Operator, all_paths, range_bounds};
use crate::config::BusinessHoursConfig;
use crate::path;
use crate::value::{Value, ValueMap};

pub(crate) fn evaluate(
    op: Operator,
    payload: &Value,
    context: &ValueMap,
    business_hours: &BusinessHoursConfig,
) -> bool {
    all_paths(payload, context, |actual, expected| match op {
        Operator::DateBetween => between(actual, expected),
        Operator::DayOfWeek => day_of_week(actual, expected),
        Operator::TimeOfDay => time_of_day(actual, expected),
        Operator::IsBusinessHours => match is_business_hours(actual, context, business_hours) {
            Some(inside) => inside == expected.to_bool(),
            None => false,
        },
        _ => compare(op, actual, expected),
    })
}

fn compare(op: Operator, actual: &Value, expected: &Value) -> bool {
    let (Some(actual), Some(expected)) = (actual.parse_time(), expected.parse_time()) else {
        return false;
    };
    let ord = actual.cmp(&expected);
    match op {
        Operator::DateLessThan => ord == Ordering::Less,
        Operator::DateLessThanEquals => ord != Ordering::Greater,
        Operator::DateGreaterThan => ord == Ordering::Greater,
        Operator::DateGreaterThanEquals => ord != Ordering::Less,
        _ => false,
    }
}

fn between(actual: &Value, expected: &Value) -> bool {
    let Some((min, max)) = range_bounds(expected) else {
        return false;
    };
    match (actual.parse_time(), min.parse_time(), max.parse_time()) {
        (Some(t), Some(min), Some(max)) => t >= min && t <= max,
        _ => false,
    }
}

// =============================================================================
// Day Of Week
// =============================================================================

fn day_of_week(actual: &Value, expected: &Value) -> bool {
    let Some(day) = weekday_of(actual) else {
        return false;
    };
    expected
        .as_elements()
        .iter()
        .any(|e| parse_weekday(&e.to_string()) == Some(day))
}

fn weekday_of(value: &Value) -> Option<Weekday> {
    match value {
        Value::Time(t) => Some(t.weekday()),
        Value::String(s) => parse_weekday(s).or_else(|| value.parse_time().map(|t| t.weekday())),
        _ => None,
    }
}

/// Parse a day name (`"Monday"`, `"mon"`, `"TUES"`), ignoring case.
#[must_use]
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let day = match name.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Weekday::Monday,
        "tuesday" | "tue" | "tues" => Weekday::Tuesday,
        "wednesday" | "wed" => Weekday::Wednesday,
        "thursday" | "thu" | "thur" | "thurs" => Weekday::Thursday,
        "friday" | "fri" => Weekday::Friday,
        "saturday" | "sat" => Weekday::Saturday,
        "sunday" | "sun" => Weekday::Sunday,
        _ => return None,
    };
    Some(day)
}

/// Full English day name.
#[must_use]
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Monday => "Monday",
        Weekday::Tuesday => "Tuesday",
        Weekday::Wednesday => "Wednesday",
        Weekday::Thursday => "Thursday",
        Weekday::Friday => "Friday",
        Weekday::Saturday => "Saturday",
        Weekday::Sunday => "Sunday",
    }
}

// =============================================================================
// Time Of Day
// =============================================================================

/// `"HH:MM"` compares for equality; `[start, end]` or `{min, max}` is an
/// inclusive window that wraps past midnight when `start > end`.
fn time_of_day(actual: &Value, expected: &Value) -> bool {
    let Some(now) = minute_of_day(actual) else {
        return false;
    };

    if let Some((start, end)) = range_bounds(expected).or_else(|| window_bounds(expected)) {
        let (Some(start), Some(end)) = (minute_of_day(start), minute_of_day(end)) else {
            return false;
        };
        return if start <= end {
            now >= start && now <= end
        } else {
            now >= start || now <= end
        };
    }

    minute_of_day(expected).is_some_and(|e| e == now)
}

fn window_bounds(expected: &Value) -> Option<(&Value, &Value)> {
    let map = expected.as_map()?;
    Some((map.get("start")?, map.get("end")?))
}

fn minute_of_day(value: &Value) -> Option<u16> {
    value
        .parse_time()
        .map(|t| u16::from(t.hour()) * 60 + u16::from(t.minute()))
}

// =============================================================================
// Business Hours
// =============================================================================

/// Whether the actual value falls inside business hours.
///
/// A boolean actual value is taken as-is, a timestamp is checked directly,
/// and anything else falls back to `environment.hour` and
/// `environment.day_of_week` from the context.
fn is_business_hours(
    actual: &Value,
    context: &ValueMap,
    hours: &BusinessHoursConfig,
) -> Option<bool> {
    match actual {
        Value::Bool(b) => return Some(*b),
        Value::Time(t) => return Some(inside(t, hours)),
        Value::String(_) => {
            if let Some(t) = actual.parse_time() {
                return Some(inside(&t, hours));
            }
        }
        _ => {}
    }

    let hour = lookup(context, "environment.hour", "environment:hour")?;
    let day = lookup(context, "environment.day_of_week", "environment:day_of_week")?;

    let hour = hour.to_number();
    if !(0.0..24.0).contains(&hour) {
        return None;
    }
    let day = weekday_of(day)?;
    Some(hours.contains(hour as u8, day))
}

fn inside(t: &OffsetDateTime, hours: &BusinessHoursConfig) -> bool {
    hours.contains(t.hour(), t.weekday())
}

fn lookup<'a>(context: &'a ValueMap, nested: &str, flat: &str) -> Option<&'a Value> {
    path::resolve(context, nested)
        .or_else(|| path::resolve(context, flat))
        .filter(|v| !v.is_absent())
}
