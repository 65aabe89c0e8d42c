//! IAM policy documents
//!
//! Statements are built with tokens for resource ARNs so grants can point
//! at resources whose ARNs are only known after deployment.

use super::token::Token;
use serde::Serialize;
use serde_json::{Value, json};

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum Effect {
    Allow,
    Deny,
}

/// A single IAM policy statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatement {
    pub sid: Option<String>,
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<Token>,
    /// Raw principal block (`{"Service": ...}`), used in resource policies
    pub principal: Option<Value>,
    pub condition: Option<Value>,
}

impl PolicyStatement {
    pub fn allow() -> Self {
        Self {
            sid: None,
            effect: Effect::Allow,
            actions: Vec::new(),
            resources: Vec::new(),
            principal: None,
            condition: None,
        }
    }

    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn resource(mut self, resource: impl Into<Token>) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn service_principal(mut self, service: &str) -> Self {
        self.principal = Some(json!({ "Service": service }));
        self
    }

    pub fn condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn to_json(&self) -> Value {
        let mut stmt = serde_json::Map::new();
        if let Some(sid) = &self.sid {
            stmt.insert("Sid".into(), json!(sid));
        }
        stmt.insert("Effect".into(), json!(self.effect));
        if let Some(principal) = &self.principal {
            stmt.insert("Principal".into(), principal.clone());
        }
        stmt.insert("Action".into(), json!(self.actions));
        if !self.resources.is_empty() {
            stmt.insert("Resource".into(), json!(self.resources));
        }
        if let Some(condition) = &self.condition {
            stmt.insert("Condition".into(), condition.clone());
        }
        Value::Object(stmt)
    }
}

/// Wrap statements into a versioned policy document
pub fn policy_document(statements: &[PolicyStatement]) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": statements.iter().map(PolicyStatement::to_json).collect::<Vec<_>>(),
    })
}

/// Trust policy allowing the given services to assume a role
pub fn assume_role_policy(services: &[&str]) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": services },
            "Action": "sts:AssumeRole",
        }],
    })
}
