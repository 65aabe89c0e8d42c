//! In-memory CloudFormation template model
//!
//! - [`token`]: deploy-time value references
//! - [`resource`]: resources, removal policies and property overrides
//! - [`stack`]: stacks, outputs and region assertions
//! - [`policy`]: IAM policy statements
//! - [`setting`]: three-state optional props

pub mod policy;
pub mod resource;
pub mod setting;
pub mod stack;
pub mod token;

pub use policy::{Effect, PolicyStatement, assume_role_policy, policy_document};
pub use resource::{RemovalPolicy, Resource};
pub use setting::Setting;
pub use stack::{Output, Stack, StackEnv, sanitize_logical_id};
pub use token::Token;

use serde_json::{Map, Value};

/// Raw JSON object deep-merged over a primitive's generated properties
pub type PropertyOverrides = Map<String, Value>;
