//! Policy decision point configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! max_evaluation_time = "100ms"
//! max_condition_depth = 32
//! unknown_operator = "deny"
//!
//! [business_hours]
//! start_hour = 9
//! end_hour = 17
//! days = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
//! ```

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use time::Weekday;

use crate::condition::temporal::{parse_weekday, weekday_name};

/// Networks considered internal unless configured otherwise.
pub const DEFAULT_INTERNAL_NETWORKS: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

// =============================================================================
// Root Configuration
// =============================================================================

/// Root configuration of the policy decision point.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PdpConfig {
    /// Hard deadline for one evaluation, including policy retrieval and
    /// attribute enrichment. Exceeding it yields a Deny decision.
    #[serde(with = "humantime_serde")]
    pub max_evaluation_time: Duration,

    /// Maximum nesting depth of `And`/`Or`/`Not` nodes.
    /// Deeper nodes evaluate to `false`.
    pub max_condition_depth: usize,

    /// Outcome of a condition operator whose name is not recognized.
    pub unknown_operator: UnknownOperatorBehavior,

    /// CIDR blocks treated as internal by `IsInternalIP` and by the
    /// `environment:is_internal_ip` context attribute.
    pub internal_networks: Vec<String>,

    /// Business-hours window used by `IsBusinessHours` and by the
    /// `environment:is_business_hours` context attribute.
    pub business_hours: BusinessHoursConfig,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            max_evaluation_time: Duration::from_millis(100),
            max_condition_depth: 32,
            unknown_operator: UnknownOperatorBehavior::Deny,
            business_hours: BusinessHoursConfig::default(),
            internal_networks: DEFAULT_INTERNAL_NETWORKS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl PdpConfig {
    /// Parse a configuration from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `max_evaluation_time` is zero
    /// - `max_condition_depth` is zero
    /// - the business-hours window is empty or names an unknown day
    /// - an internal network is not valid CIDR notation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_evaluation_time.is_zero() {
            return Err(ConfigError::InvalidValue(
                "max_evaluation_time must be > 0".to_string(),
            ));
        }

        if self.max_condition_depth == 0 {
            return Err(ConfigError::InvalidValue(
                "max_condition_depth must be > 0".to_string(),
            ));
        }

        self.business_hours.validate()?;

        for cidr in &self.internal_networks {
            if cidr.parse::<IpNetwork>().is_err() {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid internal network: '{}'. Must be CIDR notation",
                    cidr
                )));
            }
        }

        Ok(())
    }

    /// Parsed internal network table. Invalid entries are skipped.
    #[must_use]
    pub fn internal_network_ranges(&self) -> Vec<IpNetwork> {
        self.internal_networks
            .iter()
            .filter_map(|cidr| cidr.parse::<IpNetwork>().ok())
            .collect()
    }
}

/// What to do with a condition operator name that is not recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownOperatorBehavior {
    /// Treat the operator as unsatisfied (fail closed).
    #[default]
    Deny,
    /// Treat the operator as satisfied (fail open, legacy behavior).
    Allow,
}

// =============================================================================
// Business Hours
// =============================================================================

/// Business-hours window: `start_hour <= hour < end_hour` on listed days.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BusinessHoursConfig {
    /// First hour (0-23) inside the window.
    pub start_hour: u8,

    /// First hour (1-24) after the window.
    pub end_hour: u8,

    /// Day names inside the window, case-insensitive.
    pub days: Vec<String>,
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
            days: [
                Weekday::Monday,
                Weekday::Tuesday,
                Weekday::Wednesday,
                Weekday::Thursday,
                Weekday::Friday,
            ]
            .iter()
            .map(|d| weekday_name(*d).to_string())
            .collect(),
        }
    }
}

impl BusinessHoursConfig {
    /// Returns `true` if `hour` on `weekday` is inside the window.
    #[must_use]
    pub fn contains(&self, hour: u8, weekday: Weekday) -> bool {
        hour >= self.start_hour && hour < self.end_hour && self.includes_day(weekday)
    }

    /// Returns `true` if `weekday` is a business day.
    #[must_use]
    pub fn includes_day(&self, weekday: Weekday) -> bool {
        self.days
            .iter()
            .any(|d| parse_weekday(d) == Some(weekday))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(ConfigError::InvalidValue(format!(
                "business_hours window {}..{} is empty or out of range",
                self.start_hour, self.end_hour
            )));
        }
        for day in &self.days {
            if parse_weekday(day).is_none() {
                return Err(ConfigError::InvalidValue(format!(
                    "business_hours: unknown day '{}'",
                    day
                )));
            }
        }
        Ok(())
    }
}

/// Returns `true` if `ip` falls inside any of `ranges`.
#[must_use]
pub fn is_in_networks(ip: IpAddr, ranges: &[IpNetwork]) -> bool {
    ranges.iter().any(|net| net.contains(ip))
}

// =============================================================================
// Errors
// =============================================================================

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration text could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PdpConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_evaluation_time, Duration::from_millis(100));
        assert_eq!(config.unknown_operator, UnknownOperatorBehavior::Deny);
        assert_eq!(config.business_hours.start_hour, 9);
        assert_eq!(config.business_hours.end_hour, 17);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = PdpConfig::from_toml_str(
            r#"
            max_evaluation_time = "250ms"
            unknown_operator = "allow"

            [business_hours]
            start_hour = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.max_evaluation_time, Duration::from_millis(250));
        assert_eq!(config.unknown_operator, UnknownOperatorBehavior::Allow);
        assert_eq!(config.business_hours.start_hour, 8);
        assert_eq!(config.business_hours.end_hour, 17);
        assert_eq!(config.max_condition_depth, 32);
    }

    #[test]
    fn test_invalid_window() {
        let err = PdpConfig::from_toml_str(
            r#"
            [business_hours]
            start_hour = 18
            end_hour = 9
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_invalid_day_name() {
        let mut config = PdpConfig::default();
        config.business_hours.days.push("Funday".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_invalid_cidr() {
        let mut config = PdpConfig::default();
        config.internal_networks = vec!["10.0.0.0/33".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = PdpConfig::default();
        config.max_condition_depth = 0;
        assert!(config.validate().is_err());

        let mut config = PdpConfig::default();
        config.max_evaluation_time = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let err = PdpConfig::from_toml_str("max_condition_depth = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdp.toml");
        std::fs::write(&path, "max_condition_depth = 8\n").unwrap();

        let config = PdpConfig::from_file(&path).unwrap();
        assert_eq!(config.max_condition_depth, 8);

        let err = PdpConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_business_hours_contains() {
        let hours = BusinessHoursConfig::default();
        assert!(hours.contains(9, Weekday::Monday));
        assert!(hours.contains(16, Weekday::Friday));
        assert!(!hours.contains(17, Weekday::Friday));
        assert!(!hours.contains(8, Weekday::Tuesday));
        assert!(!hours.contains(12, Weekday::Saturday));
    }

    #[test]
    fn test_internal_networks() {
        let ranges = PdpConfig::default().internal_network_ranges();
        assert!(is_in_networks("10.1.2.3".parse().unwrap(), &ranges));
        assert!(is_in_networks("::1".parse().unwrap(), &ranges));
        assert!(!is_in_networks("8.8.8.8".parse().unwrap(), &ranges));
    }
}
