//! Composite constructs and their preset recipes

pub mod app;
pub mod edge;
pub mod recipes;

pub use app::{AppTree, AppTreeProps};
pub use edge::{EdgeSecurityProps, EdgeSecurityTree, SecretChoice, build_constants};
pub use recipes::{CustomDomain, EdgeOptions, HostedZone};
