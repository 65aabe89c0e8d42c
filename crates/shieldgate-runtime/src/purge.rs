//! Bucket purge custom resource
//!
//! CloudFormation cannot delete a bucket that still holds objects. When the
//! site stack is created with destroy-on-delete, this handler empties the
//! bucket on the resource's Delete so the bucket deletion that follows
//! succeeds. Every outcome is reported back to the pre-signed response URL;
//! a missing report leaves the stack waiting for an hour.

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurgeProperties {
    #[serde(rename = "BucketName", default)]
    pub bucket_name: String,
}

/// CloudFormation custom resource request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceEvent {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: PurgeProperties,
    #[serde(default)]
    pub old_resource_properties: Option<PurgeProperties>,
}

impl CustomResourceEvent {
    /// Bucket to empty for this request, if any
    pub fn bucket_to_purge(&self) -> Option<&str> {
        let bucket = match self.request_type {
            RequestType::Create => None,
            RequestType::Delete => Some(self.resource_properties.bucket_name.as_str()),
            // A renamed bucket means the old one is about to be deleted
            RequestType::Update => self
                .old_resource_properties
                .as_ref()
                .map(|old| old.bucket_name.as_str())
                .filter(|old| *old != self.resource_properties.bucket_name),
        };
        bucket.filter(|b| !b.is_empty())
    }

    fn physical_id(&self) -> String {
        self.physical_resource_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| {
                if self.resource_properties.bucket_name.is_empty() {
                    self.logical_resource_id.clone()
                } else {
                    self.resource_properties.bucket_name.clone()
                }
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Body PUT to the response URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
}

impl CustomResourceResponse {
    pub fn for_outcome(event: &CustomResourceEvent, outcome: &Result<usize>) -> Self {
        let (status, reason) = match outcome {
            Ok(deleted) => (ResponseStatus::Success, format!("Deleted {deleted} objects")),
            Err(e) => (ResponseStatus::Failed, format!("{e:#}")),
        };
        Self {
            status,
            reason,
            physical_resource_id: event.physical_id(),
            stack_id: event.stack_id.clone(),
            request_id: event.request_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
        }
    }
}

/// Deletes every object in a bucket
pub trait BucketPurger: Send + Sync {
    /// Number of objects deleted; a bucket that no longer exists counts as
    /// already empty
    fn purge(&self, bucket: &str) -> impl Future<Output = Result<usize>> + Send;
}

pub struct S3BucketPurger {
    client: aws_sdk_s3::Client,
}

impl S3BucketPurger {
    /// Client for the function's own region
    pub async fn new() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
        }
    }
}

impl BucketPurger for S3BucketPurger {
    async fn purge(&self, bucket: &str) -> Result<usize> {
        info!(bucket = %bucket, "Emptying bucket");
        let mut deleted = 0;
        let mut continuation_token = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_bucket()) => {
                    info!(bucket = %bucket, "Bucket is already gone");
                    return Ok(deleted);
                }
                Err(e) => return Err(e).context("Failed to list objects"),
            };

            let objects = response
                .contents()
                .iter()
                .filter_map(|o| o.key())
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to build object identifiers")?;

            if !objects.is_empty() {
                let count = objects.len();
                debug!(bucket = %bucket, count, "Deleting objects");
                let delete = Delete::builder()
                    .set_objects(Some(objects))
                    .quiet(true)
                    .build()
                    .context("Failed to build delete request")?;
                let output = self
                    .client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .context("Failed to delete objects")?;
                if let Some(error) = output.errors().first() {
                    anyhow::bail!(
                        "Failed to delete {}: {}",
                        error.key().unwrap_or("<unknown>"),
                        error.message().unwrap_or("no message")
                    );
                }
                deleted += count;
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        info!(bucket = %bucket, deleted, "Bucket emptied");
        Ok(deleted)
    }
}

pub struct PurgeHandler<P> {
    purger: P,
    http: reqwest::Client,
}

impl<P: BucketPurger> PurgeHandler<P> {
    pub fn new(purger: P) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { purger, http })
    }

    /// Empty the bucket if the request calls for it
    pub async fn process(&self, event: &CustomResourceEvent) -> Result<usize> {
        match event.bucket_to_purge() {
            Some(bucket) => self.purger.purge(bucket).await,
            None => Ok(0),
        }
    }

    /// Process and report; only a failed report is returned as an error
    pub async fn handle(&self, event: &CustomResourceEvent) -> Result<CustomResourceResponse> {
        let outcome = self.process(event).await;
        if let Err(e) = &outcome {
            warn!(
                error = %format!("{e:#}"),
                logical_id = %event.logical_resource_id,
                "Purge failed"
            );
        }
        let response = CustomResourceResponse::for_outcome(event, &outcome);

        let body = serde_json::to_string(&response).context("Failed to encode response")?;
        self.http
            .put(&event.response_url)
            .header("content-type", "")
            .body(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .context("Failed to report to CloudFormation")?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingPurger {
        purged: Mutex<Vec<String>>,
        fail: bool,
    }

    impl BucketPurger for RecordingPurger {
        async fn purge(&self, bucket: &str) -> Result<usize> {
            self.purged.lock().push(bucket.to_string());
            if self.fail {
                anyhow::bail!("access denied on {bucket}");
            }
            Ok(3)
        }
    }

    fn event(request_type: &str, bucket: &str, old_bucket: Option<&str>) -> CustomResourceEvent {
        let mut event = json!({
            "RequestType": request_type,
            "ServiceToken": "arn:aws:lambda:eu-west-1:123456789012:function:purge",
            "ResponseURL": "http://127.0.0.1:9/response",
            "StackId": "arn:aws:cloudformation:eu-west-1:123456789012:stack/app/abc",
            "RequestId": "req-1",
            "ResourceType": "Custom::S3AutoDeleteObjects",
            "LogicalResourceId": "SiteAutoDeleteObjects",
            "ResourceProperties": {"ServiceToken": "arn", "BucketName": bucket}
        });
        if let Some(old) = old_bucket {
            event["OldResourceProperties"] = json!({"BucketName": old});
        }
        serde_json::from_value(event).unwrap()
    }

    #[test]
    fn test_bucket_to_purge() {
        assert_eq!(event("Create", "b1", None).bucket_to_purge(), None);
        assert_eq!(event("Delete", "b1", None).bucket_to_purge(), Some("b1"));
        assert_eq!(event("Update", "b2", Some("b1")).bucket_to_purge(), Some("b1"));
        assert_eq!(event("Update", "b1", Some("b1")).bucket_to_purge(), None);
        assert_eq!(event("Delete", "", None).bucket_to_purge(), None);
    }

    #[test]
    fn test_response_body() {
        let e = event("Delete", "site-bucket", None);
        let ok = serde_json::to_value(CustomResourceResponse::for_outcome(&e, &Ok(12))).unwrap();
        assert_eq!(ok["Status"], "SUCCESS");
        assert_eq!(ok["PhysicalResourceId"], "site-bucket");
        assert_eq!(ok["RequestId"], "req-1");
        assert_eq!(ok["LogicalResourceId"], "SiteAutoDeleteObjects");

        let failed = CustomResourceResponse::for_outcome(&e, &Err(anyhow::anyhow!("boom")));
        assert_eq!(failed.status, ResponseStatus::Failed);
        assert_eq!(failed.reason, "boom");
    }

    #[test]
    fn test_physical_id_is_stable_across_requests() {
        let mut e = event("Delete", "site-bucket", None);
        e.physical_resource_id = Some("first-id".to_string());
        let r = CustomResourceResponse::for_outcome(&e, &Ok(0));
        assert_eq!(r.physical_resource_id, "first-id");
    }

    #[tokio::test]
    async fn test_process_only_purges_on_delete() {
        let handler = PurgeHandler::new(RecordingPurger::default()).unwrap();
        assert_eq!(handler.process(&event("Create", "b1", None)).await.unwrap(), 0);
        assert_eq!(handler.process(&event("Delete", "b1", None)).await.unwrap(), 3);
        assert_eq!(*handler.purger.purged.lock(), vec!["b1".to_string()]);
    }

    #[tokio::test]
    async fn test_unreachable_response_url_is_an_error() {
        let handler = PurgeHandler::new(RecordingPurger {
            fail: true,
            ..Default::default()
        })
        .unwrap();
        assert!(handler.handle(&event("Delete", "b1", None)).await.is_err());
        assert_eq!(handler.purger.purged.lock().len(), 1);
    }
}
