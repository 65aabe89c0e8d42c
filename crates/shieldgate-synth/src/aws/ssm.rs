//! SSM-backed parameter source

use super::context::AwsContext;
use crate::params::ParameterSource;
use anyhow::{Context, Result};
use aws_sdk_ssm::Client;
use std::collections::HashMap;
use tracing::{debug, warn};

/// `GetParameters` accepts at most this many names per call
const GET_PARAMETERS_BATCH: usize = 10;

/// Reads published parameters from SSM in the edge region
pub struct SsmParameterSource {
    client: Client,
}

impl SsmParameterSource {
    pub async fn new(region: &str) -> Self {
        let ctx = AwsContext::new(region, None).await;
        Self::from_context(&ctx)
    }

    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ssm_client(),
        }
    }
}

impl ParameterSource for SsmParameterSource {
    async fn get_parameters(&self, names: &[String]) -> Result<HashMap<String, String>> {
        let mut values = HashMap::with_capacity(names.len());

        for batch in names.chunks(GET_PARAMETERS_BATCH) {
            let response = self
                .client
                .get_parameters()
                .set_names(Some(batch.to_vec()))
                .send()
                .await
                .with_context(|| format!("Failed to read parameters: {}", batch.join(", ")))?;

            for param in response.parameters() {
                if let (Some(name), Some(value)) = (param.name(), param.value()) {
                    values.insert(name.to_string(), value.to_string());
                }
            }
            let missing = response.invalid_parameters();
            if !missing.is_empty() {
                debug!(missing = ?missing, "Parameters not published");
            }
        }

        if values.is_empty() && !names.is_empty() {
            warn!(
                requested = names.len(),
                "No parameters found; has the edge stack been deployed?"
            );
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::EdgeParameters;

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_missing_prefix_reads_nothing() {
        let source =
            SsmParameterSource::new(shieldgate_common::defaults::REQUIRED_EDGE_REGION).await;
        let prefix = format!("/{}/", shieldgate_test_utils::aws::test_stack_name("missing"));
        let values = source
            .get_parameters(&[format!("{prefix}header-name")])
            .await
            .unwrap();
        assert!(values.is_empty());
        assert!(EdgeParameters::load(&source, &prefix).await.is_err());
    }
}
