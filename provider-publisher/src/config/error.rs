//! Configuration errors.

use thiserror::Error;

/// Errors raised while reading the publish configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required variables that were unset or blank, in lookup order.
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid duration in {var}={value:?}: {reason}")]
    InvalidDuration {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// The ref name, less one leading `v`, is not a semantic version.
    #[error("{var}={value:?} is not a semantic version: {source}")]
    InvalidVersion {
        var: &'static str,
        value: String,
        #[source]
        source: semver::Error,
    },

    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
