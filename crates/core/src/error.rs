//! Error types shared across keyguard crates

use thiserror::Error;

/// Failure of an upstream call (metrics query, key listing, key regeneration)
///
/// Always recovered locally: a failed metrics query counts as zero errors, a
/// failed listing as no credentials, a failed regeneration as a negative
/// outcome. Never fatal to a monitoring run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Network-level failure (connect, timeout, TLS)
    #[error("transport error during {operation}: {reason}")]
    Transport { operation: String, reason: String },

    /// Authentication failed even after a token refresh
    #[error("unauthorized during {operation}: {reason}")]
    Unauthorized { operation: String, reason: String },

    /// Non-success HTTP status
    #[error("{operation} returned status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// Response did not match the expected schema
    #[error("failed to decode {operation} response: {reason}")]
    Decode { operation: String, reason: String },

    /// Anything else the provider reports
    #[error("{operation} failed: {reason}")]
    Other { operation: String, reason: String },
}

impl UpstreamError {
    /// Shorthand for [`UpstreamError::Other`]
    pub fn other(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Other {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Operation the error belongs to
    pub fn operation(&self) -> &str {
        match self {
            Self::Transport { operation, .. }
            | Self::Unauthorized { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. }
            | Self::Other { operation, .. } => operation,
        }
    }
}

/// Invalid configuration, fatal at startup
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is present but unusable
    #[error("invalid configuration: {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// A required value is absent
    #[error("missing required configuration: {field}")]
    MissingRequired { field: String },

    /// No resources to monitor
    #[error("no services configured for monitoring")]
    NoResources,
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_messages_name_the_operation() {
        let err = UpstreamError::Status {
            operation: "regenerate_key".into(),
            status: 409,
            body: "conflict".into(),
        };
        assert_eq!(err.to_string(), "regenerate_key returned status 409: conflict");
        assert_eq!(err.operation(), "regenerate_key");

        let other = UpstreamError::other("list_keys", "boom");
        assert_eq!(other.operation(), "list_keys");
    }

    #[test]
    fn config_error_messages() {
        assert_eq!(
            ConfigError::missing("services[0].name").to_string(),
            "missing required configuration: services[0].name"
        );
        assert_eq!(
            ConfigError::invalid("monitoring.check_interval", "must be greater than zero")
                .to_string(),
            "invalid configuration: monitoring.check_interval: must be greater than zero"
        );
    }
}
