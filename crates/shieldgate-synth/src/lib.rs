//! shieldgate-synth - Construct library and synthesizer
//!
//! Builds two CloudFormation stacks: an edge security stack pinned to
//! us-east-1 (web ACL, rotating origin secret, edge function, certificate)
//! and an application stack (API behind a request authorizer, identity pool,
//! data table, static site on a CDN). The app stack learns the edge stack's
//! identifiers through the parameter store.

pub mod aws;
pub mod config;
pub mod constructs;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod primitives;
pub mod template;

pub use error::{ConfigError, Result, SynthError};
