//! Working evaluation context.
//!
//! One flat attribute map is built per evaluation from the request and the
//! resolver's enrichment output. It carries namespaced keys for direct
//! lookup and nested maps for dotted paths:
//!
//! | key                          | source                                  |
//! |------------------------------|-----------------------------------------|
//! | `request:SubjectId`, `request:UserId`, `request:ResourceId`, `request:Action`, `request:Time` | request |
//! | `environment:hour`, `environment:day_of_week`, `environment:time_of_day`, `environment:is_weekend`, `environment:is_business_hours` | evaluation time |
//! | `environment:client_ip`, `environment:ip_type`, `environment:is_internal_ip`, `environment:is_external_ip`, `environment:is_mobile`, `environment:browser`, ... | environment data |
//! | `user:*`, `resource:*`, `action:*` | enrichment                         |
//! | `user`, `resource`, `action`, `environment` | same attributes, nested  |
//!
//! Caller-supplied request context is merged last and wins on conflict.
//!
//! # Usage
//!
//! ```
//! use bastion_pdp::context::WorkingContextBuilder;
//! use bastion_pdp::model::EvaluationRequest;
//!
//! let request = EvaluationRequest::new("user-123", "api:documents:1", "docs:file:read");
//! let context = WorkingContextBuilder::new()
//!     .with_request(&request)
//!     .build()?;
//!
//! assert_eq!(context.get("request:UserId").map(ToString::to_string).as_deref(), Some("user-123"));
//! # Ok::<(), bastion_pdp::context::ContextError>(())
//! ```

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use time::{OffsetDateTime, Weekday};

use crate::condition::temporal::weekday_name;
use crate::config::{BusinessHoursConfig, is_in_networks};
use crate::model::{EnvironmentData, EvaluationContext, EvaluationRequest};
use crate::path;
use crate::value::{Value, ValueMap};

// =============================================================================
// Working Context
// =============================================================================

/// Attribute map consumed by matchers and condition evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingContext {
    values: ValueMap,
    timestamp: OffsetDateTime,
}

impl WorkingContext {
    /// All attributes.
    #[must_use]
    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    /// Resolve an attribute path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        path::resolve(&self.values, path)
    }

    /// Evaluation time the context was derived for.
    #[must_use]
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Consume the context, returning the attribute map.
    #[must_use]
    pub fn into_values(self) -> ValueMap {
        self.values
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for a [`WorkingContext`].
#[derive(Debug, Default)]
pub struct WorkingContextBuilder<'a> {
    request: Option<&'a EvaluationRequest>,
    attributes: Option<EvaluationContext>,
    business_hours: Option<&'a BusinessHoursConfig>,
    internal_networks: &'a [IpNetwork],
    clock: Option<OffsetDateTime>,
}

impl<'a> WorkingContextBuilder<'a> {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request being evaluated.
    #[must_use]
    pub fn with_request(mut self, request: &'a EvaluationRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// Set the attribute resolver's output.
    #[must_use]
    pub fn with_attributes(mut self, attributes: EvaluationContext) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Set the business-hours window used for `environment:is_business_hours`.
    #[must_use]
    pub fn with_business_hours(mut self, hours: &'a BusinessHoursConfig) -> Self {
        self.business_hours = Some(hours);
        self
    }

    /// Set the networks classified as internal.
    #[must_use]
    pub fn with_internal_networks(mut self, networks: &'a [IpNetwork]) -> Self {
        self.internal_networks = networks;
        self
    }

    /// Override the wall clock used when no timestamp is supplied.
    #[must_use]
    pub fn with_clock(mut self, now: OffsetDateTime) -> Self {
        self.clock = Some(now);
        self
    }

    /// Build the working context.
    ///
    /// # Errors
    ///
    /// Returns an error if no request was provided.
    pub fn build(self) -> Result<WorkingContext, ContextError> {
        let request = self.request.ok_or(ContextError::MissingRequest)?;
        let attributes = self.attributes.unwrap_or_default();
        let default_hours;
        let hours = match self.business_hours {
            Some(hours) => hours,
            None => {
                default_hours = BusinessHoursConfig::default();
                &default_hours
            }
        };

        let timestamp = attributes
            .timestamp
            .or(request.timestamp)
            .or(self.clock)
            .unwrap_or_else(OffsetDateTime::now_utc);

        let mut values = ValueMap::new();

        // Request
        values.insert("request:SubjectId".into(), request.subject_id.as_str().into());
        values.insert("request:UserId".into(), request.subject_id.as_str().into());
        values.insert("request:ResourceId".into(), request.resource_id.as_str().into());
        values.insert("request:Action".into(), request.action.as_str().into());
        values.insert("request:Time".into(), timestamp.into());

        // Environment
        let mut environment = time_attributes(timestamp, hours);
        if let Some(env) = attributes.environment.as_ref().or(request.environment.as_ref()) {
            environment.extend(environment_attributes(env, self.internal_networks));
        }
        insert_namespaced(&mut values, "environment", &environment);

        // Subject / resource / action
        let mut user = attributes.subject;
        user.entry("id".to_string())
            .or_insert_with(|| request.subject_id.as_str().into());
        let mut resource = attributes.resource;
        resource
            .entry("id".to_string())
            .or_insert_with(|| request.resource_id.as_str().into());
        let mut action = attributes.action;
        action
            .entry("id".to_string())
            .or_insert_with(|| request.action.as_str().into());

        insert_namespaced(&mut values, "user", &user);
        insert_namespaced(&mut values, "resource", &resource);
        insert_namespaced(&mut values, "action", &action);

        values.insert("user".into(), Value::Map(user));
        values.insert("resource".into(), Value::Map(resource));
        values.insert("action".into(), Value::Map(action));
        values.insert("environment".into(), Value::Map(environment));

        // Caller context
        for (key, value) in &request.context {
            values.insert(key.clone(), value.clone());
        }

        Ok(WorkingContext { values, timestamp })
    }
}

fn insert_namespaced(values: &mut ValueMap, namespace: &str, attributes: &ValueMap) {
    for (key, value) in attributes {
        values.insert(format!("{namespace}:{key}"), value.clone());
    }
}

// =============================================================================
// Derived Attributes
// =============================================================================

fn time_attributes(now: OffsetDateTime, hours: &BusinessHoursConfig) -> ValueMap {
    let weekday = now.weekday();
    let mut attrs = ValueMap::new();
    attrs.insert(
        "time_of_day".into(),
        format!("{:02}:{:02}", now.hour(), now.minute()).into(),
    );
    attrs.insert("day_of_week".into(), weekday_name(weekday).into());
    attrs.insert("hour".into(), now.hour().into());
    attrs.insert(
        "is_weekend".into(),
        matches!(weekday, Weekday::Saturday | Weekday::Sunday).into(),
    );
    attrs.insert(
        "is_business_hours".into(),
        hours.contains(now.hour(), weekday).into(),
    );
    attrs
}

fn environment_attributes(env: &EnvironmentData, internal_networks: &[IpNetwork]) -> ValueMap {
    let mut attrs = ValueMap::new();

    if let Some(raw_ip) = env.client_ip.as_deref() {
        attrs.insert("client_ip".into(), raw_ip.into());
        match raw_ip.trim().parse::<IpAddr>() {
            Ok(ip) => {
                let internal = is_in_networks(ip, internal_networks);
                let ip_type = if ip.is_ipv4() { "ipv4" } else { "ipv6" };
                attrs.insert("ip_type".into(), ip_type.into());
                attrs.insert("is_internal_ip".into(), internal.into());
                attrs.insert("is_external_ip".into(), (!internal).into());
            }
            Err(_) => {
                tracing::debug!(client_ip = %raw_ip, "Unparseable client IP");
                attrs.insert("ip_type".into(), "unknown".into());
            }
        }
    }

    if let Some(user_agent) = env.user_agent.as_deref() {
        attrs.insert("user_agent".into(), user_agent.into());
        attrs.insert("is_mobile".into(), is_mobile(user_agent).into());
        attrs.insert("browser".into(), browser_family(user_agent).into());
    }

    if let Some(country) = env.country.as_deref() {
        attrs.insert("country".into(), country.into());
    }
    if let Some(region) = env.region.as_deref() {
        attrs.insert("region".into(), region.into());
    }

    for (key, value) in &env.custom {
        attrs.insert(key.clone(), value.clone());
    }
    attrs
}

const MOBILE_MARKERS: &[&str] = &[
    "mobile",
    "android",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "windows phone",
    "opera mini",
    "iemobile",
];

/// Returns `true` if the user agent looks like a mobile device.
#[must_use]
pub fn is_mobile(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    MOBILE_MARKERS.iter().any(|marker| ua.contains(marker))
}

/// Coarse browser family from a user agent.
///
/// Checked in order, since Chromium-based agents also advertise Safari.
#[must_use]
pub fn browser_family(user_agent: &str) -> &'static str {
    let ua = user_agent.to_ascii_lowercase();
    if ua.is_empty() {
        "Unknown"
    } else if ua.contains("edg/") || ua.contains("edge/") {
        "Edge"
    } else if ua.contains("opr/") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("chrome/") || ua.contains("crios/") {
        "Chrome"
    } else if ua.contains("firefox/") || ua.contains("fxios/") {
        "Firefox"
    } else if ua.contains("safari/") {
        "Safari"
    } else if ua.contains("msie") || ua.contains("trident/") {
        "Internet Explorer"
    } else {
        "Other"
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur when building a [`WorkingContext`].
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// No request was provided.
    #[error("Missing evaluation request")]
    MissingRequest,
}

// =============================================================================
// Tests
// =============================================================================
