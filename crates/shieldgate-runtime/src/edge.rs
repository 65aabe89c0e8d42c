//! CloudFront origin-request handler
//!
//! Stamps the current shared secret onto every request forwarded to the API
//! origin. When the secret cannot be read the request is answered at the
//! edge with a 403 and never reaches the origin.

use crate::error::RuntimeError;
use crate::secrets::CachedSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shieldgate_common::{HeaderEntry, Headers, SecretSource, inject_header};
use tracing::warn;

/// Origin-request event; CloudFront sends exactly one record
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeRecord {
    pub cf: CfPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CfPayload {
    pub request: CfRequest,
}

/// Request as CloudFront hands it over.
///
/// Fields other than the headers pass through untouched; CloudFront rejects
/// a returned request that lost any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfRequest {
    #[serde(default)]
    pub headers: Headers,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Generated response that short-circuits the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CfResponse {
    pub status: String,
    pub status_description: String,
    pub headers: Headers,
    pub body: String,
}

impl CfResponse {
    /// 403 with a body that says nothing about why
    pub fn forbidden() -> Self {
        let mut headers = Headers::new();
        headers.insert(
            "content-type".to_string(),
            vec![HeaderEntry {
                key: Some("Content-Type".to_string()),
                value: "text/plain".to_string(),
            }],
        );
        Self {
            status: "403".to_string(),
            status_description: "Forbidden".to_string(),
            headers,
            body: "Forbidden".to_string(),
        }
    }
}

/// What the handler returns to CloudFront
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EdgeResult {
    Request(CfRequest),
    Response(CfResponse),
}

pub struct OriginHeaderInjector<S> {
    header_name: String,
    secret: CachedSecret<S>,
}

impl<S: SecretSource> OriginHeaderInjector<S> {
    pub fn new(header_name: impl Into<String>, secret: CachedSecret<S>) -> Self {
        Self {
            header_name: header_name.into(),
            secret,
        }
    }

    pub fn secret(&self) -> &CachedSecret<S> {
        &self.secret
    }

    /// Set the header on `request` to the current secret at `now` (ms)
    pub async fn inject(
        &self,
        mut request: CfRequest,
        now: i64,
    ) -> Result<CfRequest, RuntimeError> {
        let value = self.secret.current(now).await?;
        inject_header(&mut request.headers, &self.header_name, &value);
        Ok(request)
    }

    pub async fn handle(&self, event: EdgeEvent, now: i64) -> EdgeResult {
        let Some(record) = event.records.into_iter().next() else {
            warn!("Origin request event has no records");
            return EdgeResult::Response(CfResponse::forbidden());
        };

        match self.inject(record.cf.request, now).await {
            Ok(request) => EdgeResult::Request(request),
            Err(e) => {
                warn!(error = %e, "Rejecting request at the edge");
                EdgeResult::Response(CfResponse::forbidden())
            }
        }
    }
}

/// Handler whose build-time settings may be unusable; without them every
/// request is rejected at the edge
pub enum EdgeHandler<S> {
    Ready(OriginHeaderInjector<S>),
    Misconfigured,
}

impl<S: SecretSource> EdgeHandler<S> {
    pub async fn handle(&self, event: EdgeEvent, now: i64) -> EdgeResult {
        match self {
            Self::Ready(injector) => injector.handle(event, now).await,
            Self::Misconfigured => {
                warn!("Rejecting request at the edge: function settings are invalid");
                EdgeResult::Response(CfResponse::forbidden())
            }
        }
    }
}
