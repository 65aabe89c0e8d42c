//! Bucket purge custom resource provider

use lambda_runtime::{Error, LambdaEvent, run, service_fn};
use shieldgate_runtime::purge::{CustomResourceEvent, PurgeHandler, S3BucketPurger};

#[tokio::main]
async fn main() -> Result<(), Error> {
    shieldgate_runtime::init_tracing();

    let handler = PurgeHandler::new(S3BucketPurger::new().await)?;
    let handler = &handler;
    run(service_fn(move |event: LambdaEvent<CustomResourceEvent>| async move {
        handler.handle(&event.payload).await?;
        Ok::<_, Error>(())
    }))
    .await
}
