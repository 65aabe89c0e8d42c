//! Secrets Manager rotation function for the shared secret

use lambda_runtime::{Error, LambdaEvent, run, service_fn};
use shieldgate_runtime::config::RotationConfig;
use shieldgate_runtime::rotation::{RotationEvent, Rotator, SecretsManagerRotationStore};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    shieldgate_runtime::init_tracing();

    let config = RotationConfig::from_env()?;
    info!(
        ssm_prefix = ?config.ssm_prefix,
        secret_length = config.secret_length,
        "Rotation function starting"
    );

    let rotator = Rotator::new(SecretsManagerRotationStore::new().await, config);
    let rotator = &rotator;
    run(service_fn(move |event: LambdaEvent<RotationEvent>| async move {
        rotator.handle(&event.payload, chrono::Utc::now()).await?;
        Ok::<_, Error>(())
    }))
    .await
}
