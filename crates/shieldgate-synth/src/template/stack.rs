//! Stacks: one deployable template each

use super::resource::Resource;
use super::token::Token;
use crate::error::{Result, SynthError};
use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use shieldgate_common::ResourceKind;
use tracing::debug;

/// CloudFormation caps logical ids at 255 characters
const MAX_LOGICAL_ID_LEN: usize = 255;

/// Deployment environment of a stack.
///
/// `None` means environment-agnostic: the value is left to deploy time and
/// surfaces in the template as a pseudo parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackEnv {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl StackEnv {
    pub fn region(region: impl Into<String>) -> Self {
        Self {
            account: None,
            region: Some(region.into()),
        }
    }

    pub fn agnostic() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub value: Token,
    pub description: Option<String>,
    pub export_name: Option<String>,
}

/// Turn a construct id into a CloudFormation logical id.
///
/// Only ASCII letters and digits survive; path separators and punctuation
/// are dropped.
pub fn sanitize_logical_id(id: &str) -> Result<String> {
    let clean: String = id.chars().filter(char::is_ascii_alphanumeric).collect();
    if clean.is_empty() || clean.len() > MAX_LOGICAL_ID_LEN {
        return Err(SynthError::InvalidLogicalId(id.to_string()));
    }
    Ok(clean)
}

/// A resource graph that deploys as one unit
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    env: StackEnv,
    description: Option<String>,
    resources: IndexMap<String, Resource>,
    outputs: IndexMap<String, Output>,
    rules: IndexMap<String, Value>,
    dependencies: Vec<String>,
}

impl Stack {
    pub fn new(name: impl Into<String>, env: StackEnv) -> Self {
        Self {
            name: name.into(),
            env,
            description: None,
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
            rules: IndexMap::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &StackEnv {
        &self.env
    }

    /// Literal region if the stack is pinned to one
    pub fn region_literal(&self) -> Option<&str> {
        self.env.region.as_deref()
    }

    pub fn region(&self) -> Token {
        match &self.env.region {
            Some(r) => Token::literal(r),
            None => Token::region(),
        }
    }

    pub fn account(&self) -> Token {
        match &self.env.account {
            Some(a) => Token::literal(a),
            None => Token::account_id(),
        }
    }

    /// Assert that the stack deploys to `required`.
    ///
    /// A literal region that differs fails immediately. An unresolved region
    /// cannot be checked now, so a template rule is added that makes the
    /// deployment itself fail in any other region.
    pub fn require_region(&mut self, required: &'static str, construct: &str) -> Result<()> {
        match self.env.region.as_deref() {
            Some(actual) if actual == required => Ok(()),
            Some(actual) => Err(SynthError::RegionMismatch {
                construct: construct.to_string(),
                required,
                actual: actual.to_string(),
            }),
            None => {
                let rule_id = format!("RequireRegion{}", required.replace('-', ""));
                debug!(
                    stack = %self.name,
                    rule = %rule_id,
                    "Region unresolved, deferring check to deploy time"
                );
                self.rules.entry(rule_id).or_insert_with(|| {
                    json!({
                        "Assertions": [{
                            "Assert": { "Fn::Equals": [{ "Ref": "AWS::Region" }, required] },
                            "AssertDescription":
                                format!("{construct} must be deployed to {required}"),
                        }]
                    })
                });
                Ok(())
            }
        }
    }

    /// Register a resource and return its logical id
    pub fn add(&mut self, id: &str, resource: Resource) -> Result<String> {
        let logical_id = sanitize_logical_id(id)?;
        if self.resources.contains_key(&logical_id) {
            return Err(SynthError::DuplicateLogicalId(logical_id));
        }
        self.resources.insert(logical_id.clone(), resource);
        Ok(logical_id)
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.resources.contains_key(logical_id)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Option<&mut Resource> {
        self.resources.get_mut(logical_id)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn resources_of_kind(&self, kind: ResourceKind) -> Vec<(&str, &Resource)> {
        self.resources().filter(|(_, r)| r.kind == kind).collect()
    }

    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.resources.values().filter(|r| r.kind == kind).count()
    }

    pub fn add_output(
        &mut self,
        id: &str,
        value: Token,
        description: impl Into<String>,
    ) -> Result<String> {
        let logical_id = sanitize_logical_id(id)?;
        if self.outputs.contains_key(&logical_id) {
            return Err(SynthError::DuplicateLogicalId(logical_id));
        }
        self.outputs.insert(
            logical_id.clone(),
            Output {
                value,
                description: Some(description.into()),
                export_name: None,
            },
        );
        Ok(logical_id)
    }

    pub fn output(&self, logical_id: &str) -> Option<&Output> {
        self.outputs.get(logical_id)
    }

    pub fn rules(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Record that this stack must deploy after `stack_name`
    pub fn add_dependency(&mut self, stack_name: impl Into<String>) {
        let name = stack_name.into();
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn to_template(&self) -> Value {
        let mut template = Map::new();
        template.insert("AWSTemplateFormatVersion".into(), json!("2010-09-09"));
        if let Some(description) = &self.description {
            template.insert("Description".into(), json!(description));
        }
        if !self.rules.is_empty() {
            template.insert("Rules".into(), json!(self.rules));
        }
        let resources: Map<String, Value> = self
            .resources
            .iter()
            .map(|(id, r)| (id.clone(), r.to_json()))
            .collect();
        template.insert("Resources".into(), Value::Object(resources));
        if !self.outputs.is_empty() {
            let outputs: Map<String, Value> = self
                .outputs
                .iter()
                .map(|(id, o)| {
                    let mut out = Map::new();
                    if let Some(d) = &o.description {
                        out.insert("Description".into(), json!(d));
                    }
                    out.insert("Value".into(), json!(o.value));
                    if let Some(export) = &o.export_name {
                        out.insert("Export".into(), json!({ "Name": export }));
                    }
                    (id.clone(), Value::Object(out))
                })
                .collect();
            template.insert("Outputs".into(), Value::Object(outputs));
        }
        Value::Object(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_logical_id() {
        assert_eq!(sanitize_logical_id("App/Site-Bucket").unwrap(), "AppSiteBucket");
        assert!(matches!(
            sanitize_logical_id("--"),
            Err(SynthError::InvalidLogicalId(_))
        ));
    }

    #[test]
    fn test_duplicate_logical_id_rejected() {
        let mut stack = Stack::new("s", StackEnv::agnostic());
        stack.add("Table", Resource::new(ResourceKind::DynamoDbTable)).unwrap();
        let err = stack
            .add("Table", Resource::new(ResourceKind::DynamoDbTable))
            .unwrap_err();
        assert!(matches!(err, SynthError::DuplicateLogicalId(id) if id == "Table"));
    }

    #[test]
    fn test_region_lock_literal_mismatch() {
        let mut stack = Stack::new("s", StackEnv::region("eu-west-1"));
        let err = stack.require_region("us-east-1", "Edge").unwrap_err();
        assert!(err.to_string().contains("us-east-1"));
        assert!(err.to_string().contains("eu-west-1"));
    }

    #[test]
    fn test_region_lock_deferred_rule() {
        let mut stack = Stack::new("s", StackEnv::agnostic());
        stack.require_region("us-east-1", "Edge").unwrap();
        stack.require_region("us-east-1", "Edge").unwrap();
        let template = stack.to_template();
        let rules = template["Rules"].as_object().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules["RequireRegionuseast1"]["Assertions"][0]["Assert"]["Fn::Equals"][1],
            "us-east-1"
        );
    }

    #[test]
    fn test_region_token() {
        assert_eq!(
            Stack::new("a", StackEnv::region("us-east-1")).region(),
            Token::literal("us-east-1")
        );
        assert_eq!(Stack::new("a", StackEnv::agnostic()).region(), Token::region());
    }

    #[test]
    fn test_template_sections() {
        let mut stack = Stack::new("s", StackEnv::agnostic()).with_description("demo");
        stack.add("Bucket", Resource::new(ResourceKind::S3Bucket)).unwrap();
        stack
            .add_output("BucketName", Token::reference("Bucket"), "bucket")
            .unwrap();
        let t = stack.to_template();
        assert_eq!(t["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(t["Resources"]["Bucket"]["Type"], "AWS::S3::Bucket");
        assert_eq!(t["Outputs"]["BucketName"]["Value"], json!({"Ref": "Bucket"}));
        assert!(t.get("Rules").is_none());
    }
}
