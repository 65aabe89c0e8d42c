//! Handler configuration
//!
//! The authorizer and rotation handler read their settings from the Lambda
//! environment once per cold start. The edge function cannot: edge runtimes
//! have no environment variables, so its settings are compiled in from the
//! build constants the synthesizer writes to `<stack>.edge-build.json`.

use crate::error::ConfigError;
use garde::Validate;
use shieldgate_common::defaults::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_HEADER_NAME, DEFAULT_SECRET_LENGTH, REQUIRED_EDGE_REGION,
};
use shieldgate_common::params::normalize_prefix;

/// Environment variable names
pub mod env {
    pub const ORIGIN_HEADER_NAME: &str = "ORIGIN_HEADER_NAME";
    pub const ORIGIN_SECRET_ID: &str = "ORIGIN_SECRET_ID";
    pub const SECRET_CACHE_TTL_SECONDS: &str = "SECRET_CACHE_TTL_SECONDS";
    pub const USER_POOL_ID: &str = "USER_POOL_ID";
    pub const USER_POOL_CLIENT_ID: &str = "USER_POOL_CLIENT_ID";
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const SSM_PREFIX: &str = "SSM_PREFIX";
    pub const SECRET_LENGTH: &str = "SECRET_LENGTH";
}

/// Longest TTL the handlers accept; longer would outlive a rotation window
pub const MAX_CACHE_TTL_SECS: u64 = 3600;

fn valid_header_name(value: &str, _: &()) -> garde::Result {
    let ok = value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(garde::Error::new("header name must be ASCII letters, digits, '-' or '_'"))
    }
}

fn valid_pool_id(value: &Option<String>, _: &()) -> garde::Result {
    match value {
        Some(id) if pool_region(id).is_none() => Err(garde::Error::new(
            "user pool id must look like '<region>_<id>'",
        )),
        _ => Ok(()),
    }
}

/// Region encoded in a user pool id (`us-east-1_AbC123` → `us-east-1`)
pub fn pool_region(pool_id: &str) -> Option<&str> {
    let (region, id) = pool_id.split_once('_')?;
    (region.matches('-').count() >= 2 && !id.is_empty()).then_some(region)
}

fn parse_ttl(name: &'static str, raw: Option<String>) -> Result<u64, ConfigError> {
    match raw.filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map_err(|e| ConfigError::Invalid {
            name,
            reason: format!("{v:?} is not a number of seconds: {e}"),
        }),
        None => Ok(DEFAULT_CACHE_TTL_SECS),
    }
}

/// Request authorizer settings
#[derive(Debug, Clone, Validate)]
pub struct AuthorizerConfig {
    #[garde(length(min = 1, max = 256), custom(valid_header_name))]
    pub header_name: String,

    /// Secret ARN; its region is where the secret is read from
    #[garde(length(min = 1))]
    pub secret_id: Option<String>,

    #[garde(range(max = MAX_CACHE_TTL_SECS))]
    pub cache_ttl_secs: u64,

    #[garde(custom(valid_pool_id))]
    pub user_pool_id: Option<String>,

    #[garde(length(min = 1))]
    pub client_id: Option<String>,

    /// Region the function runs in
    #[garde(length(min = 1))]
    pub region: String,
}

impl AuthorizerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name → value lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let config = Self {
            header_name: get(env::ORIGIN_HEADER_NAME)
                .unwrap_or_else(|| DEFAULT_HEADER_NAME.to_string()),
            secret_id: get(env::ORIGIN_SECRET_ID),
            cache_ttl_secs: parse_ttl(
                env::SECRET_CACHE_TTL_SECONDS,
                get(env::SECRET_CACHE_TTL_SECONDS),
            )?,
            user_pool_id: get(env::USER_POOL_ID),
            client_id: get(env::USER_POOL_CLIENT_ID),
            region: get(env::AWS_REGION).ok_or(ConfigError::Missing {
                name: env::AWS_REGION,
            })?,
        };

        if config.user_pool_id.is_some() != config.client_id.is_some() {
            return Err(ConfigError::PartialPair {
                first: env::USER_POOL_ID,
                second: env::USER_POOL_CLIENT_ID,
            });
        }
        if config.secret_id.is_none() && config.user_pool_id.is_none() {
            return Err(ConfigError::NoChecks {
                secret: env::ORIGIN_SECRET_ID,
                pool: env::USER_POOL_ID,
            });
        }
        config.validate()?;
        Ok(config)
    }

    /// Token issuer of the configured pool
    pub fn issuer(&self) -> Option<String> {
        let pool = self.user_pool_id.as_deref()?;
        let region = pool_region(pool).unwrap_or(&self.region);
        Some(format!("https://cognito-idp.{region}.amazonaws.com/{pool}"))
    }

    pub fn jwks_url(&self) -> Option<String> {
        self.issuer().map(|iss| format!("{iss}/.well-known/jwks.json"))
    }
}

/// Edge function settings, fixed at build time
#[derive(Debug, Clone, Validate)]
pub struct EdgeConfig {
    #[garde(length(min = 1))]
    pub secret_name: String,
    #[garde(length(min = 1))]
    pub secret_region: String,
    #[garde(length(min = 1, max = 256), custom(valid_header_name))]
    pub header_name: String,
    #[garde(range(max = MAX_CACHE_TTL_SECS))]
    pub cache_ttl_secs: u64,
}

impl EdgeConfig {
    /// Settings compiled into this binary
    pub fn from_build() -> Result<Self, ConfigError> {
        Self::from_values(
            option_env!("SECRET_NAME"),
            option_env!("SECRET_REGION"),
            option_env!("HEADER_NAME"),
            option_env!("CACHE_TTL_SECONDS"),
        )
    }

    pub fn from_values(
        secret_name: Option<&str>,
        secret_region: Option<&str>,
        header_name: Option<&str>,
        cache_ttl_secs: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            secret_name: secret_name
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing {
                    name: "SECRET_NAME",
                })?
                .to_string(),
            secret_region: secret_region
                .filter(|v| !v.is_empty())
                .unwrap_or(REQUIRED_EDGE_REGION)
                .to_string(),
            header_name: header_name
                .filter(|v| !v.is_empty())
                .unwrap_or(DEFAULT_HEADER_NAME)
                .to_string(),
            cache_ttl_secs: parse_ttl("CACHE_TTL_SECONDS", cache_ttl_secs.map(str::to_string))?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Rotation handler settings
#[derive(Debug, Clone, Validate)]
pub struct RotationConfig {
    /// Where `secret-rotated-at` is written; unset skips the write
    #[garde(length(min = 2))]
    pub ssm_prefix: Option<String>,
    #[garde(range(min = 16, max = 128))]
    pub secret_length: u32,
}

impl RotationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let secret_length = match get(env::SECRET_LENGTH) {
            Some(v) => v.parse().map_err(|e| ConfigError::Invalid {
                name: env::SECRET_LENGTH,
                reason: format!("{v:?}: {e}"),
            })?,
            None => DEFAULT_SECRET_LENGTH,
        };
        let config = Self {
            ssm_prefix: get(env::SSM_PREFIX).map(|p| normalize_prefix(&p)),
            secret_length,
        };
        config.validate()?;
        Ok(config)
    }
}
