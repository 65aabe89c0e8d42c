//! Resource primitives
//!
//! Each primitive wraps one managed resource type (plus the IAM glue it
//! needs). Constructors resolve every unset prop to its default, register
//! resources in the stack and return a handle exposing derived identifiers.
//! They never touch the network.

pub mod api;
pub mod certificate;
pub mod edge_function;
pub mod firewall;
pub mod function;
pub mod identity;
pub mod parameter;
pub mod secret;
pub mod site;
pub mod table;

pub use api::{ApiDeps, ApiProps, RestApi};
pub use certificate::{Certificate, CertificateProps};
pub use edge_function::{EdgeFunction, EdgeFunctionProps};
pub use firewall::{Firewall, FirewallProps, ManagedRuleGroup};
pub use function::{Architecture, FunctionCode, FunctionProps, LambdaFunction};
pub use identity::{Identity, IdentityProps, MfaMode};
pub use parameter::{ParameterTier, StringParameter, StringParameterProps};
pub use secret::{OriginSecret, RotatingSecret, RotatingSecretProps, schedule_expression};
pub use site::{PriceClass, SiteDeps, SiteProps, StaticSite};
pub use table::{Attribute, AttributeType, BillingMode, DataTable, TableProps};
