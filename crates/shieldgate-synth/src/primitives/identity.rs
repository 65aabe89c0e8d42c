//! Cognito user pool and app client

use crate::error::{Result, SynthError};
use crate::template::{
    PropertyOverrides, RemovalPolicy, Resource, Stack, Token, sanitize_logical_id,
};
use serde_json::json;
use shieldgate_common::ResourceKind;

pub const DEFAULT_PASSWORD_MIN_LENGTH: u32 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
pub enum MfaMode {
    #[default]
    #[strum(serialize = "OFF")]
    Off,
    #[strum(serialize = "OPTIONAL")]
    Optional,
    #[strum(serialize = "ON")]
    Required,
}

#[derive(Debug, Clone, Default)]
pub struct IdentityProps {
    pub user_pool_name: Option<String>,
    /// Default: false
    pub self_sign_up: Option<bool>,
    /// Default: 8 characters
    pub password_min_length: Option<u32>,
    /// Default: off
    pub mfa: Option<MfaMode>,
    pub client_name: Option<String>,
    /// Default: false; browser clients cannot keep a secret
    pub generate_client_secret: Option<bool>,
    /// Default: `Retain`
    pub removal_policy: Option<RemovalPolicy>,
    /// Deep-merged over the user pool properties
    pub property_overrides: PropertyOverrides,
}

/// Handle to a synthesized user pool and its client
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_pool_logical_id: String,
    pub client_logical_id: String,
    pub user_pool_id: Token,
    pub user_pool_arn: Token,
    pub user_pool_client_id: Token,
    /// `https://cognito-idp.<region>.amazonaws.com/<pool id>`
    pub issuer_url: Token,
    pub removal_policy: RemovalPolicy,
}

impl Identity {
    pub fn new(stack: &mut Stack, id: &str, props: IdentityProps) -> Result<Self> {
        let base = sanitize_logical_id(id)?;
        let min_length = props
            .password_min_length
            .unwrap_or(DEFAULT_PASSWORD_MIN_LENGTH);
        if !(6..=99).contains(&min_length) {
            return Err(SynthError::invalid(
                "password_min_length",
                format!("{min_length} is outside 6..=99"),
            ));
        }
        let removal_policy = props.removal_policy.unwrap_or(RemovalPolicy::Retain);
        let self_sign_up = props.self_sign_up.unwrap_or(false);

        let pool = Resource::new(ResourceKind::UserPool)
            .with_properties(json!({
                "UserPoolName": props.user_pool_name,
                "UsernameAttributes": ["email"],
                "AutoVerifiedAttributes": ["email"],
                "AdminCreateUserConfig": { "AllowAdminCreateUserOnly": !self_sign_up },
                "MfaConfiguration": props.mfa.unwrap_or_default().to_string(),
                "Policies": {
                    "PasswordPolicy": {
                        "MinimumLength": min_length,
                        "RequireLowercase": true,
                        "RequireUppercase": true,
                        "RequireNumbers": true,
                        "RequireSymbols": false,
                    }
                },
                "AccountRecoverySetting": {
                    "RecoveryMechanisms": [{ "Name": "verified_email", "Priority": 1 }]
                },
            }))
            .with_overrides(&props.property_overrides)
            .with_removal_policy(Some(removal_policy));
        let pool_id = stack.add(&format!("{base}UserPool"), pool)?;

        let client = Resource::new(ResourceKind::UserPoolClient).with_properties(json!({
            "UserPoolId": Token::reference(&pool_id),
            "ClientName": props.client_name,
            "GenerateSecret": props.generate_client_secret.unwrap_or(false),
            "ExplicitAuthFlows": ["ALLOW_USER_SRP_AUTH", "ALLOW_REFRESH_TOKEN_AUTH"],
            "PreventUserExistenceErrors": "ENABLED",
        }));
        let client_id = stack.add(&format!("{base}UserPoolClient"), client)?;

        Ok(Self {
            user_pool_id: Token::reference(&pool_id),
            user_pool_arn: Token::get_att(&pool_id, "Arn"),
            user_pool_client_id: Token::reference(&client_id),
            issuer_url: Token::sub(format!(
                "https://cognito-idp.${{AWS::Region}}.${{AWS::URLSuffix}}/${{{pool_id}}}"
            )),
            user_pool_logical_id: pool_id,
            client_logical_id: client_id,
            removal_policy,
        })
    }
}
