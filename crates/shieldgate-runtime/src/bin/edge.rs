//! CloudFront origin-request function
//!
//! Settings are compiled in; see [`EdgeConfig::from_build`]. When they are
//! unusable the function still starts and answers every request with a 403.

use lambda_runtime::{Error, LambdaEvent, run, service_fn};
use shieldgate_common::timestamp_millis;
use shieldgate_runtime::config::EdgeConfig;
use shieldgate_runtime::edge::{EdgeEvent, EdgeHandler, OriginHeaderInjector};
use shieldgate_runtime::secrets::{CachedSecret, SecretsManagerFetcher};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    shieldgate_runtime::init_tracing();

    let handler = match EdgeConfig::from_build() {
        Ok(config) => {
            info!(
                secret = %config.secret_name,
                secret_region = %config.secret_region,
                header = %config.header_name,
                "Edge function starting"
            );
            let fetcher = SecretsManagerFetcher::new(&config.secret_region).await;
            EdgeHandler::Ready(OriginHeaderInjector::new(
                config.header_name,
                CachedSecret::new(fetcher, config.secret_name, config.cache_ttl_secs),
            ))
        }
        Err(e) => {
            error!(error = %e, "Edge settings are invalid, rejecting all requests");
            EdgeHandler::Misconfigured
        }
    };

    let handler = &handler;
    run(service_fn(move |event: LambdaEvent<EdgeEvent>| async move {
        Ok::<_, Error>(handler.handle(event.payload, timestamp_millis()).await)
    }))
    .await
}
