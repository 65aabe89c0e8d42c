//! Synthesis and configuration errors

use thiserror::Error;

/// Errors raised while building a construct tree
///
/// Every variant is raised at synthesis time. Nothing is deployed when one
/// of these escapes.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error(
        "custom domain '{domain_name}' requires a certificate: supply a certificate ARN \
         or a hosted zone to mint one in us-east-1"
    )]
    MissingCertificate { domain_name: String },

    #[error("'{first}' and '{second}' must be supplied together")]
    PartialPair {
        first: &'static str,
        second: &'static str,
    },

    #[error("'{field}' requires '{requires}' to be set")]
    DependentField {
        field: &'static str,
        requires: &'static str,
    },

    #[error("{construct} must be deployed to {required}, but the stack region is {actual}")]
    RegionMismatch {
        construct: String,
        required: &'static str,
        actual: String,
    },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("logical id '{0}' is already used in this stack")]
    DuplicateLogicalId(String),

    #[error("logical id '{0}' must contain at least one ASCII letter or digit")]
    InvalidLogicalId(String),

    #[error("edge build constant '{name}' is not known at synthesis time")]
    UnresolvedBuildConstant { name: String },

    #[error("required parameter '{name}' was not found")]
    MissingParameter { name: String },
}

impl SynthError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SynthError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = SynthError> = std::result::Result<T, E>;

/// Errors from command-line and file configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("--{first} and --{second} must be provided together")]
    PartialPair {
        first: &'static str,
        second: &'static str,
    },

    #[error("--{field} requires --{requires}")]
    DependentOption {
        field: &'static str,
        requires: &'static str,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}
