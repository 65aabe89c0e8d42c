//! Template resources and escape-hatch overrides

use serde::Serialize;
use serde_json::{Map, Value, json};
use shieldgate_common::ResourceKind;

/// What happens to a resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum RemovalPolicy {
    Retain,
    /// Serialized as CloudFormation's `Delete`
    #[serde(rename = "Delete")]
    #[strum(to_string = "Destroy", serialize = "delete")]
    Destroy,
    Snapshot,
}

/// One entry of the template `Resources` section
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub properties: Map<String, Value>,
    pub depends_on: Vec<String>,
    pub removal_policy: Option<RemovalPolicy>,
    pub metadata: Map<String, Value>,
}

impl Resource {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            properties: Map::new(),
            depends_on: Vec::new(),
            removal_policy: None,
            metadata: Map::new(),
        }
    }

    /// Replace all properties with the entries of a JSON object.
    ///
    /// Null-valued entries are dropped so optional props can be written
    /// inline as `Option` values.
    pub fn with_properties(mut self, properties: Value) -> Self {
        if let Value::Object(map) = properties {
            self.properties = map.into_iter().filter(|(_, v)| !v.is_null()).collect();
        }
        self
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let id = logical_id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    pub fn with_removal_policy(mut self, policy: Option<RemovalPolicy>) -> Self {
        self.removal_policy = policy;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Deep-merge raw properties over the generated ones.
    ///
    /// Objects merge key by key; any other value (arrays included) replaces
    /// what was generated. A `null` override deletes the property.
    pub fn with_overrides(mut self, overrides: &Map<String, Value>) -> Self {
        merge_into(&mut self.properties, overrides);
        self
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("Type".into(), json!(self.kind.type_name()));
        if !self.properties.is_empty() {
            out.insert("Properties".into(), Value::Object(self.properties.clone()));
        }
        if !self.depends_on.is_empty() {
            out.insert("DependsOn".into(), json!(self.depends_on));
        }
        if let Some(policy) = self.removal_policy {
            out.insert("DeletionPolicy".into(), json!(policy));
            out.insert("UpdateReplacePolicy".into(), json!(policy));
        }
        if !self.metadata.is_empty() {
            out.insert("Metadata".into(), Value::Object(self.metadata.clone()));
        }
        Value::Object(out)
    }
}

fn merge_into(target: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        match (target.get_mut(key), value) {
            (_, Value::Null) => {
                target.remove(key);
            }
            (Some(Value::Object(existing)), Value::Object(patch)) => merge_into(existing, patch),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_nulls_dropped() {
        let r = Resource::new(ResourceKind::S3Bucket)
            .with_properties(json!({"BucketName": null, "Tags": []}));
        assert!(r.prop("BucketName").is_none());
        assert!(r.prop("Tags").is_some());
    }

    #[test]
    fn test_override_deep_merge() {
        let r = Resource::new(ResourceKind::DynamoDbTable)
            .with_properties(json!({
                "BillingMode": "PAY_PER_REQUEST",
                "PointInTimeRecoverySpecification": {"PointInTimeRecoveryEnabled": true},
                "SSESpecification": {"SSEEnabled": true},
            }))
            .with_overrides(&obj(json!({
                "PointInTimeRecoverySpecification": {"PointInTimeRecoveryEnabled": false},
                "SSESpecification": null,
                "TableClass": "STANDARD_INFREQUENT_ACCESS",
            })));

        assert_eq!(r.prop("BillingMode"), Some(&json!("PAY_PER_REQUEST")));
        assert_eq!(
            r.prop("PointInTimeRecoverySpecification"),
            Some(&json!({"PointInTimeRecoveryEnabled": false}))
        );
        assert!(r.prop("SSESpecification").is_none());
        assert_eq!(r.prop("TableClass"), Some(&json!("STANDARD_INFREQUENT_ACCESS")));
    }

    #[test]
    fn test_removal_policy_renders_both_policies() {
        let json = Resource::new(ResourceKind::S3Bucket)
            .with_removal_policy(Some(RemovalPolicy::Destroy))
            .to_json();
        assert_eq!(json["DeletionPolicy"], "Delete");
        assert_eq!(json["UpdateReplacePolicy"], "Delete");
    }

    #[test]
    fn test_removal_policy_parse() {
        assert_eq!("retain".parse::<RemovalPolicy>().unwrap(), RemovalPolicy::Retain);
        assert_eq!("Destroy".parse::<RemovalPolicy>().unwrap(), RemovalPolicy::Destroy);
        assert_eq!("delete".parse::<RemovalPolicy>().unwrap(), RemovalPolicy::Destroy);
    }
}
