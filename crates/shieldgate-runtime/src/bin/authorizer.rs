//! REQUEST authorizer for the application API

use lambda_runtime::{Error, LambdaEvent, run, service_fn};
use shieldgate_common::timestamp_millis;
use shieldgate_runtime::authorizer::{Authorizer, AuthorizerEvent};
use shieldgate_runtime::config::AuthorizerConfig;
use shieldgate_runtime::jwt::{JwksKeyProvider, TokenVerifier};
use shieldgate_runtime::secrets::{CachedSecret, SecretsManagerFetcher};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    shieldgate_runtime::init_tracing();

    let config = AuthorizerConfig::from_env()?;
    info!(
        header = %config.header_name,
        header_check = config.secret_id.is_some(),
        token_check = config.user_pool_id.is_some(),
        cache_ttl_secs = config.cache_ttl_secs,
        "Authorizer starting"
    );

    let mut authorizer: Authorizer<SecretsManagerFetcher, JwksKeyProvider> = Authorizer::new();
    if let Some(secret_id) = &config.secret_id {
        let fetcher = SecretsManagerFetcher::for_secret(secret_id, &config.region).await;
        authorizer = authorizer.with_header_check(
            config.header_name.clone(),
            CachedSecret::new(fetcher, secret_id.clone(), config.cache_ttl_secs),
        );
    }
    if let (Some(url), Some(issuer), Some(client_id)) =
        (config.jwks_url(), config.issuer(), config.client_id.clone())
    {
        let keys = JwksKeyProvider::new(url)?;
        authorizer = authorizer.with_token_check(TokenVerifier::new(keys, issuer, client_id));
    }

    let authorizer = &authorizer;
    run(service_fn(move |event: LambdaEvent<AuthorizerEvent>| async move {
        Ok::<_, Error>(authorizer.handle(&event.payload, timestamp_millis()).await)
    }))
    .await
}
