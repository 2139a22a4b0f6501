//! Policy decision point error types.
//!
//! Only failures that prevent a decision from being produced are errors.
//! Malformed condition payloads, bad regexes, unparseable IPs and the like
//! are contained inside condition evaluation and simply fail the leaf.

use crate::config::ConfigError;

/// Result type for policy decision point operations.
pub type PdpResult<T> = Result<T, PdpError>;

/// Errors that abort an evaluation before a decision is produced.
#[derive(Debug, thiserror::Error)]
pub enum PdpError {
    /// The evaluation request is missing a required field.
    #[error("Invalid request: {message}")]
    Validation {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The policy store failed to return policies.
    #[error("Policy storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The attribute resolver failed to enrich the request.
    #[error("Attribute resolution failed: {message}")]
    AttributeResolution {
        /// Description of the enrichment failure.
        message: String,
    },

    /// The engine configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A policy or request document could not be (de)serialized.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },
}

impl PdpError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `AttributeResolution` error.
    #[must_use]
    pub fn attribute_resolution(message: impl Into<String>) -> Self {
        Self::AttributeResolution {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns the error category for this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } | Self::Serialization { .. } => ErrorCategory::Request,
            Self::Storage { .. } | Self::AttributeResolution { .. } => ErrorCategory::Collaborator,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }

    /// Returns `true` if the caller supplied a bad request.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<serde_json::Error> for PdpError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Coarse classification of errors, used by callers choosing a fail-open
/// or fail-closed posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request or document itself is bad.
    Request,
    /// An external collaborator (storage, attribute resolution) failed.
    Collaborator,
    /// The engine is misconfigured.
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Collaborator => write!(f, "collaborator"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}
