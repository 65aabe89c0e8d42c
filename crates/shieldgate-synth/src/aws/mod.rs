//! AWS clients used at synthesis time
//!
//! - SSM: reading the edge stack's published parameters
//! - STS: pinning the stack account

pub mod account;
pub mod context;
pub mod error;
pub mod ssm;

pub use account::{AccountId, get_current_account_id};
pub use context::AwsContext;
pub use error::{AwsError, classify_anyhow_error, classify_aws_error};
pub use ssm::SsmParameterSource;
