//! Network operators.
//!
//! The actual value must be an IP literal; anything else fails the leaf.
//! CIDR blocks are parsed on use and unparseable blocks are skipped.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

use super::{Operator, all_paths};
use crate::config::is_in_networks;
use crate::value::{Value, ValueMap};

pub(crate) fn evaluate(
    op: Operator,
    payload: &Value,
    context: &ValueMap,
    internal_networks: &[IpNetwork],
) -> bool {
    all_paths(payload, context, |actual, expected| match op {
        Operator::IsInternalIp => {
            let internal = match actual {
                Value::Bool(b) => Some(*b),
                other => parse_ip(other).map(|ip| is_in_networks(ip, internal_networks)),
            };
            internal.is_some_and(|i| i == expected.to_bool())
        }
        _ => {
            let Some(ip) = parse_ip(actual) else {
                return false;
            };
            let in_range = cidr_blocks(expected).any(|net| net.contains(ip));
            match op {
                Operator::IpInRange => in_range,
                Operator::IpNotInRange => !in_range,
                _ => false,
            }
        }
    })
}

/// Parse an IP literal from a value.
#[must_use]
pub fn parse_ip(value: &Value) -> Option<IpAddr> {
    value.as_str()?.trim().parse().ok()
}

fn cidr_blocks(expected: &Value) -> impl Iterator<Item = IpNetwork> + '_ {
    expected.as_elements().iter().filter_map(|block| {
        let text = block.to_string();
        match text.trim().parse::<IpNetwork>() {
            Ok(net) => Some(net),
            Err(e) => {
                tracing::debug!(cidr = %text, error = %e, "Skipping invalid CIDR block");
                None
            }
        }
    })
}
