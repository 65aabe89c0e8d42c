//! Reading the edge tree's published parameters
//!
//! The app tree never synthesizes together with the edge tree. It reads the
//! values the edge stack published to the parameter store through a
//! [`ParameterSource`]: SSM in real runs, [`StaticParameterSource`] in tests
//! and offline builds.

use crate::error::{ConfigError, SynthError};
use crate::primitives::StringParameter;
use crate::template::Stack;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use shieldgate_common::ParameterKey;
use shieldgate_common::params::normalize_prefix;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::Path;
use strum::IntoEnumIterator;
use tracing::{debug, info};

/// Account id used when simulating a deployment of an account-agnostic stack
pub const SIMULATED_ACCOUNT_ID: &str = "000000000000";

/// Looks up parameter values by full name.
///
/// Names that do not exist are left out of the result instead of failing the
/// whole read.
pub trait ParameterSource: Send + Sync {
    fn get_parameters(
        &self,
        names: &[String],
    ) -> impl Future<Output = Result<HashMap<String, String>>> + Send;
}

/// Concrete values published by a deployed edge stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeParameters {
    pub prefix: String,
    pub header_name: String,
    pub secret_arn: String,
    pub edge_function_version_arn: String,
    pub waf_acl_arn: Option<String>,
    pub certificate_arn: Option<String>,
}

impl EdgeParameters {
    /// Fetch every published key under `prefix` in one pass
    pub async fn load(source: &impl ParameterSource, prefix: &str) -> Result<Self> {
        let prefix = normalize_prefix(prefix);
        let names: Vec<String> = ParameterKey::iter()
            .filter(|k| *k != ParameterKey::SecretRotatedAt)
            .map(|k| k.under(&prefix))
            .collect();
        debug!(prefix = %prefix, count = names.len(), "Reading edge parameters");
        let values = source.get_parameters(&names).await?;
        let params = Self::from_values(&prefix, &values)?;
        info!(
            prefix = %params.prefix,
            firewall = params.waf_acl_arn.is_some(),
            certificate = params.certificate_arn.is_some(),
            "Loaded edge parameters"
        );
        Ok(params)
    }

    /// Build from a name → value map; required keys must be present
    pub fn from_values(
        prefix: &str,
        values: &HashMap<String, String>,
    ) -> Result<Self, SynthError> {
        let prefix = normalize_prefix(prefix);
        let get = |key: ParameterKey| -> Result<Option<String>, SynthError> {
            let name = key.under(&prefix);
            match values.get(&name).filter(|v| !v.is_empty()) {
                Some(v) => Ok(Some(v.clone())),
                None if key.is_required() => Err(SynthError::MissingParameter { name }),
                None => Ok(None),
            }
        };
        let required = |key| get(key).map(Option::unwrap_or_default);
        Ok(Self {
            header_name: required(ParameterKey::HeaderName)?,
            secret_arn: required(ParameterKey::SecretArn)?,
            edge_function_version_arn: required(ParameterKey::EdgeFunctionVersionArn)?,
            waf_acl_arn: get(ParameterKey::WafAclArn)?,
            certificate_arn: get(ParameterKey::CertificateArn)?,
            prefix,
        })
    }
}

/// In-memory parameter store
#[derive(Debug, Clone, Default)]
pub struct StaticParameterSource {
    values: BTreeMap<String, String>,
}

impl StaticParameterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a flat JSON object of parameter name to value
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(&display, e))?;
        let values = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        Ok(Self { values })
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stand in for deploying `stack`: resolve each parameter's value
    /// against simulated physical ids and store the result.
    pub fn register_deployed(
        &mut self,
        stack: &Stack,
        parameters: &[StringParameter],
    ) -> Result<(), SynthError> {
        for param in parameters {
            let value = simulate_value(stack, &param.value).ok_or_else(|| {
                SynthError::invalid(
                    "value",
                    format!("parameter '{}' references a resource outside the stack", param.name),
                )
            })?;
            debug!(name = %param.name, value = %value, "Registered simulated parameter");
            self.values.insert(param.name.clone(), value);
        }
        Ok(())
    }
}

impl ParameterSource for StaticParameterSource {
    async fn get_parameters(&self, names: &[String]) -> Result<HashMap<String, String>> {
        Ok(names
            .iter()
            .filter_map(|n| self.values.get(n).map(|v| (n.clone(), v.clone())))
            .collect())
    }
}

/// Resolve a token the way a deployment of `stack` would, with made-up but
/// stable physical ids.
pub fn simulate_value(stack: &Stack, token: &crate::template::Token) -> Option<String> {
    let region = stack.region_literal().unwrap_or("us-east-1").to_string();
    let account = stack
        .env()
        .account
        .clone()
        .unwrap_or_else(|| SIMULATED_ACCOUNT_ID.to_string());
    let lookup = |name: &str, attr: Option<&str>| -> Option<String> {
        match (name, attr) {
            ("AWS::Region", None) => return Some(region.clone()),
            ("AWS::AccountId", None) => return Some(account.clone()),
            ("AWS::Partition", None) => return Some("aws".to_string()),
            ("AWS::URLSuffix", None) => return Some("amazonaws.com".to_string()),
            ("AWS::StackName", None) => return Some(stack.name().to_string()),
            _ => {}
        }
        let kind = stack.resource(name)?.kind;
        let base = format!(
            "arn:aws:{}:{region}:{account}:{}/{name}",
            kind.type_name().split("::").nth(1).unwrap_or("custom").to_lowercase(),
            stack.name()
        );
        Some(match attr {
            Some(attr) => format!("{base}/{attr}"),
            None => base,
        })
    };
    token.resolve_with(&lookup)
}
