//! SSM string parameters

use crate::error::{Result, SynthError};
use crate::template::{Resource, Stack, Token};
use serde_json::json;
use shieldgate_common::ResourceKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
pub enum ParameterTier {
    #[default]
    Standard,
    Advanced,
}

#[derive(Debug, Clone)]
pub struct StringParameterProps {
    /// Full parameter name, starting with `/`
    pub name: String,
    pub value: Token,
    pub description: Option<String>,
    /// Default: `Standard`
    pub tier: Option<ParameterTier>,
}

/// Handle to a published parameter
#[derive(Debug, Clone)]
pub struct StringParameter {
    pub logical_id: String,
    pub name: String,
    pub value: Token,
    pub parameter_arn: Token,
}

impl StringParameter {
    pub fn new(stack: &mut Stack, id: &str, props: StringParameterProps) -> Result<Self> {
        if !props.name.starts_with('/') {
            return Err(SynthError::invalid(
                "name",
                format!("parameter name '{}' must start with '/'", props.name),
            ));
        }
        let logical_id = stack.add(
            id,
            Resource::new(ResourceKind::SsmParameter).with_properties(json!({
                "Name": props.name,
                "Type": "String",
                "Value": props.value,
                "Description": props.description,
                "Tier": props.tier.unwrap_or_default().to_string(),
            })),
        )?;
        Ok(Self {
            parameter_arn: Token::sub(format!(
                "arn:${{AWS::Partition}}:ssm:${{AWS::Region}}:${{AWS::AccountId}}:parameter{}",
                props.name
            )),
            logical_id,
            name: props.name,
            value: props.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::StackEnv;

    #[test]
    fn test_parameter() {
        let mut stack = Stack::new("s", StackEnv::agnostic());
        let p = StringParameter::new(
            &mut stack,
            "HeaderNameParam",
            StringParameterProps {
                name: "/app/security/header-name".into(),
                value: Token::literal("x-origin-verify"),
                description: None,
                tier: None,
            },
        )
        .unwrap();
        let r = stack.resource(&p.logical_id).unwrap();
        assert_eq!(r.prop("Name"), Some(&json!("/app/security/header-name")));
        assert_eq!(r.prop("Tier"), Some(&json!("Standard")));
        assert_eq!(r.prop("Type"), Some(&json!("String")));
    }

    #[test]
    fn test_relative_name_rejected() {
        let mut stack = Stack::new("s", StackEnv::agnostic());
        let err = StringParameter::new(
            &mut stack,
            "P",
            StringParameterProps {
                name: "app/x".into(),
                value: Token::literal("v"),
                description: None,
                tier: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::InvalidValue { field: "name", .. }));
    }
}
