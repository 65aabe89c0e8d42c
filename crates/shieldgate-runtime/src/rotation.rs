//! Shared-secret rotation
//!
//! Secrets Manager drives rotation through four calls against the same
//! client request token: `createSecret` stages a new value as `AWSPENDING`,
//! `setSecret` and `testSecret` get a chance to install and check it, and
//! `finishSecret` moves `AWSCURRENT` onto it. Consumers only read
//! `AWSCURRENT`, so until their caches expire they keep presenting the
//! previous value, which the authorizer also still holds in its cache.

use crate::config::RotationConfig;
use anyhow::{Context, Result, bail};
use aws_config::BehaviorVersion;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Deserialize;
use shieldgate_common::{ParameterKey, SecretPayload};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::info;

pub const STAGE_CURRENT: &str = "AWSCURRENT";
pub const STAGE_PENDING: &str = "AWSPENDING";

/// Version id → staging labels
pub type VersionStages = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum RotationStep {
    CreateSecret,
    SetSecret,
    TestSecret,
    FinishSecret,
}

/// Rotation invocation payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RotationEvent {
    pub secret_id: String,
    pub client_request_token: String,
    pub step: RotationStep,
}

/// Secret versions plus the parameter the finish step writes
pub trait RotationStore: Send + Sync {
    fn version_stages(&self, secret_id: &str) -> impl Future<Output = Result<VersionStages>> + Send;

    /// Secret string of a version, selected by id and/or stage; `None` when
    /// no such version exists
    fn get_secret_value(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
        stage: Option<&str>,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    fn put_pending(
        &self,
        secret_id: &str,
        token: &str,
        secret_string: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Move `AWSCURRENT` to `token`, off `previous`
    fn promote(
        &self,
        secret_id: &str,
        token: &str,
        previous: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn record_rotation(
        &self,
        parameter: &str,
        value: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Random alphanumeric secret value
pub fn generate_value(length: u32) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length as usize)
        .map(char::from)
        .collect()
}

pub struct Rotator<R> {
    store: R,
    config: RotationConfig,
}

impl<R: RotationStore> Rotator<R> {
    pub fn new(store: R, config: RotationConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Run one rotation step; errors go back to Secrets Manager, which
    /// retries the step
    pub async fn handle(&self, event: &RotationEvent, now: DateTime<Utc>) -> Result<()> {
        let secret_id = event.secret_id.as_str();
        let token = event.client_request_token.as_str();
        info!(secret_id = %secret_id, step = %event.step, "Rotation step");

        let versions = self.store.version_stages(secret_id).await?;
        let Some(stages) = versions.get(token) else {
            bail!("secret version {token} has no stage for rotation of {secret_id}");
        };
        if stages.iter().any(|s| s == STAGE_CURRENT) {
            info!(secret_id = %secret_id, token = %token, "Version is already AWSCURRENT");
            // A retried finish may follow a promote whose parameter write failed
            if event.step == RotationStep::FinishSecret {
                self.record_rotated_at(now).await?;
            }
            return Ok(());
        }
        if !stages.iter().any(|s| s == STAGE_PENDING) {
            bail!("secret version {token} is not AWSPENDING for rotation of {secret_id}");
        }

        match event.step {
            RotationStep::CreateSecret => self.create_secret(secret_id, token).await,
            RotationStep::SetSecret => Ok(()),
            RotationStep::TestSecret => self.test_secret(secret_id, token).await,
            RotationStep::FinishSecret => {
                self.finish_secret(secret_id, token, &versions, now).await
            }
        }
    }

    async fn create_secret(&self, secret_id: &str, token: &str) -> Result<()> {
        let current = self
            .store
            .get_secret_value(secret_id, None, Some(STAGE_CURRENT))
            .await?
            .with_context(|| format!("{secret_id} has no AWSCURRENT version"))?;
        let current = SecretPayload::parse(&current)
            .with_context(|| format!("{secret_id} AWSCURRENT payload is unusable"))?;

        if self
            .store
            .get_secret_value(secret_id, Some(token), Some(STAGE_PENDING))
            .await?
            .is_some()
        {
            info!(secret_id = %secret_id, token = %token, "Pending version already exists");
            return Ok(());
        }

        let value = generate_value(self.config.secret_length);
        let pending = SecretPayload::new(current.header_name, value);
        self.store
            .put_pending(secret_id, token, &pending.to_secret_string())
            .await?;
        info!(secret_id = %secret_id, token = %token, "Pending version created");
        Ok(())
    }

    async fn test_secret(&self, secret_id: &str, token: &str) -> Result<()> {
        let pending = self
            .store
            .get_secret_value(secret_id, Some(token), Some(STAGE_PENDING))
            .await?
            .with_context(|| format!("{secret_id} has no pending version {token}"))?;
        SecretPayload::parse(&pending)
            .with_context(|| format!("{secret_id} pending payload is unusable"))?;
        Ok(())
    }

    async fn finish_secret(
        &self,
        secret_id: &str,
        token: &str,
        versions: &VersionStages,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let previous = versions
            .iter()
            .find(|(_, stages)| stages.iter().any(|s| s == STAGE_CURRENT))
            .map(|(version, _)| version.as_str());

        self.store.promote(secret_id, token, previous).await?;
        info!(secret_id = %secret_id, token = %token, previous = ?previous, "AWSCURRENT moved");

        self.record_rotated_at(now).await
    }

    async fn record_rotated_at(&self, now: DateTime<Utc>) -> Result<()> {
        let Some(prefix) = &self.config.ssm_prefix else {
            return Ok(());
        };
        let parameter = ParameterKey::SecretRotatedAt.under(prefix);
        let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.store.record_rotation(&parameter, &stamp).await
    }
}

/// Secrets Manager and Parameter Store in the secret's region
pub struct SecretsManagerRotationStore {
    secrets: aws_sdk_secretsmanager::Client,
    ssm: aws_sdk_ssm::Client,
}

impl SecretsManagerRotationStore {
    /// Clients for the function's own region, which is the secret's
    pub async fn new() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self {
            secrets: aws_sdk_secretsmanager::Client::new(&config),
            ssm: aws_sdk_ssm::Client::new(&config),
        }
    }
}

impl RotationStore for SecretsManagerRotationStore {
    async fn version_stages(&self, secret_id: &str) -> Result<VersionStages> {
        let output = self
            .secrets
            .describe_secret()
            .secret_id(secret_id)
            .send()
            .await
            .with_context(|| format!("DescribeSecret failed for {secret_id}"))?;
        if output.rotation_enabled() != Some(true) {
            bail!("rotation is not enabled for {secret_id}");
        }
        Ok(output
            .version_ids_to_stages()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
        stage: Option<&str>,
    ) -> Result<Option<String>> {
        let result = self
            .secrets
            .get_secret_value()
            .secret_id(secret_id)
            .set_version_id(version_id.map(str::to_string))
            .set_version_stage(stage.map(str::to_string))
            .send()
            .await;
        match result {
            Ok(output) => Ok(output.secret_string().map(str::to_string)),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("GetSecretValue failed for {secret_id}")),
        }
    }

    async fn put_pending(&self, secret_id: &str, token: &str, secret_string: &str) -> Result<()> {
        self.secrets
            .put_secret_value()
            .secret_id(secret_id)
            .client_request_token(token)
            .secret_string(secret_string)
            .version_stages(STAGE_PENDING)
            .send()
            .await
            .with_context(|| format!("PutSecretValue failed for {secret_id}"))?;
        Ok(())
    }

    async fn promote(&self, secret_id: &str, token: &str, previous: Option<&str>) -> Result<()> {
        self.secrets
            .update_secret_version_stage()
            .secret_id(secret_id)
            .version_stage(STAGE_CURRENT)
            .move_to_version_id(token)
            .set_remove_from_version_id(previous.map(str::to_string))
            .send()
            .await
            .with_context(|| format!("UpdateSecretVersionStage failed for {secret_id}"))?;
        Ok(())
    }

    async fn record_rotation(&self, parameter: &str, value: &str) -> Result<()> {
        self.ssm
            .put_parameter()
            .name(parameter)
            .value(value)
            .r#type(aws_sdk_ssm::types::ParameterType::String)
            .overwrite(true)
            .send()
            .await
            .with_context(|| format!("PutParameter failed for {parameter}"))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    values: BTreeMap<String, String>,
    stages: VersionStages,
    parameters: BTreeMap<String, String>,
}

/// Single-secret store held in memory
#[derive(Debug, Default)]
pub struct InMemoryRotationStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryRotationStore {
    /// Store whose `AWSCURRENT` version is `version_id`
    pub fn with_current(version_id: &str, secret_string: &str) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock();
            state.values.insert(version_id.to_string(), secret_string.to_string());
            state
                .stages
                .insert(version_id.to_string(), vec![STAGE_CURRENT.to_string()]);
        }
        store
    }

    /// Register `token` as pending without a value, as `RotateSecret` does
    pub fn begin_rotation(&self, token: &str) {
        self.state
            .lock()
            .stages
            .insert(token.to_string(), vec![STAGE_PENDING.to_string()]);
    }

    pub fn stages(&self, version_id: &str) -> Vec<String> {
        self.state
            .lock()
            .stages
            .get(version_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn secret_string(&self, version_id: &str) -> Option<String> {
        self.state.lock().values.get(version_id).cloned()
    }

    pub fn parameter(&self, name: &str) -> Option<String> {
        self.state.lock().parameters.get(name).cloned()
    }
}

impl RotationStore for InMemoryRotationStore {
    async fn version_stages(&self, _secret_id: &str) -> Result<VersionStages> {
        Ok(self.state.lock().stages.clone())
    }

    async fn get_secret_value(
        &self,
        _secret_id: &str,
        version_id: Option<&str>,
        stage: Option<&str>,
    ) -> Result<Option<String>> {
        let state = self.state.lock();
        let version = state.stages.iter().find(|(version, stages)| {
            version_id.is_none_or(|v| v == version.as_str())
                && stage.is_none_or(|s| stages.iter().any(|x| x == s))
        });
        Ok(version.and_then(|(version, _)| state.values.get(version).cloned()))
    }

    async fn put_pending(&self, _secret_id: &str, token: &str, secret_string: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.values.insert(token.to_string(), secret_string.to_string());
        let stages = state.stages.entry(token.to_string()).or_default();
        if !stages.iter().any(|s| s == STAGE_PENDING) {
            stages.push(STAGE_PENDING.to_string());
        }
        Ok(())
    }

    async fn promote(&self, _secret_id: &str, token: &str, previous: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(previous) = previous {
            if let Some(stages) = state.stages.get_mut(previous) {
                stages.retain(|s| s != STAGE_CURRENT);
                stages.push("AWSPREVIOUS".to_string());
            }
        }
        let stages = state.stages.entry(token.to_string()).or_default();
        stages.retain(|s| s != STAGE_PENDING);
        stages.push(STAGE_CURRENT.to_string());
        Ok(())
    }

    async fn record_rotation(&self, parameter: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .parameters
            .insert(parameter.to_string(), value.to_string());
        Ok(())
    }
}
