//! Two-phase synthesis
//!
//! Phase 1 synthesizes the edge stack. Its published parameters are then
//! read back, either from a real deployment through a [`ParameterSource`] or
//! from a simulated one, and phase 2 synthesizes the app stack against those
//! concrete values. The resulting [`Assembly`] is written to disk as one
//! template per stack plus a manifest.

use crate::config::SynthConfig;
use crate::constructs::{AppTree, AppTreeProps, EdgeSecurityTree};
use crate::error::{Result, SynthError};
use crate::params::{EdgeParameters, ParameterSource, StaticParameterSource};
use crate::template::{RemovalPolicy, Stack, StackEnv};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Construct id of the edge tree inside the edge stack
pub const EDGE_TREE_ID: &str = "EdgeSecurity";
/// Construct id of the app tree inside the app stack
pub const APP_TREE_ID: &str = "App";

pub const MANIFEST_FILE: &str = "manifest.json";

/// A synthesized edge stack and the handles of its tree
#[derive(Debug)]
pub struct EdgeBuild {
    pub stack: Stack,
    pub tree: EdgeSecurityTree,
}

/// A synthesized app stack and the handles of its tree
#[derive(Debug)]
pub struct AppBuild {
    pub stack: Stack,
    pub tree: AppTree,
}

fn removal_policy(config: &SynthConfig) -> RemovalPolicy {
    if config.flags.destroy_on_delete {
        RemovalPolicy::Destroy
    } else {
        RemovalPolicy::Retain
    }
}

fn stack_env(region: Option<&str>, account: Option<&str>) -> StackEnv {
    let env = match region {
        Some(region) => StackEnv::region(region),
        None => StackEnv::agnostic(),
    };
    match account {
        Some(account) => env.with_account(account),
        None => env,
    }
}

/// Phase 1: the edge security stack
pub fn build_edge(config: &SynthConfig) -> Result<EdgeBuild> {
    let mut stack = Stack::new(
        config.edge_stack_name(),
        stack_env(Some(&config.stacks.edge_region), config.stacks.account.as_deref()),
    )
    .with_description("shieldgate edge security: web ACL, rotating origin secret, edge function");

    let options = config.edge_options();
    // A domain without a certificate gets one minted next to the distribution
    let tree = match (config.firewall(), config.custom_domain()) {
        (true, Some(domain)) => {
            EdgeSecurityTree::with_custom_domain(&mut stack, EDGE_TREE_ID, options, &domain)?
        }
        (true, None) => EdgeSecurityTree::with_firewall(&mut stack, EDGE_TREE_ID, options)?,
        (false, _) => EdgeSecurityTree::minimal(&mut stack, EDGE_TREE_ID, options)?,
    };

    info!(
        stack = %stack.name(),
        resources = stack.resources().count(),
        firewall = tree.firewall.is_some(),
        certificate = tree.certificate.is_some(),
        "Synthesized edge stack"
    );
    Ok(EdgeBuild { stack, tree })
}

/// Phase 2: the application stack, wired to `edge` when it is given
pub fn build_app(config: &SynthConfig, edge: Option<EdgeParameters>) -> Result<AppBuild> {
    let mut stack = Stack::new(
        config.app_stack_name(),
        stack_env(config.stacks.app_region.as_deref(), config.stacks.account.as_deref()),
    )
    .with_description("shieldgate application: API, identity, data table, static site");

    if let Some(edge) = edge.as_ref().filter(|e| config.firewall() && e.waf_acl_arn.is_none()) {
        return Err(SynthError::MissingParameter {
            name: shieldgate_common::ParameterKey::WafAclArn.under(&edge.prefix),
        });
    }

    let mut props = AppTreeProps {
        removal_policy: Some(removal_policy(config)),
        edge,
        ..Default::default()
    };
    if let Some(domain) = config.custom_domain() {
        domain.apply(&mut props.site);
    }
    let tree = AppTree::new(&mut stack, APP_TREE_ID, props)?;

    info!(
        stack = %stack.name(),
        resources = stack.resources().count(),
        domains = tree.site.domain_names.len(),
        "Synthesized app stack"
    );
    Ok(AppBuild { stack, tree })
}

/// Read the edge stack's published parameters
pub async fn load_edge_parameters(
    config: &SynthConfig,
    source: &impl ParameterSource,
) -> anyhow::Result<EdgeParameters> {
    EdgeParameters::load(source, &config.security.ssm_prefix)
        .await
        .with_context(|| {
            format!(
                "Failed to load edge parameters under {}",
                config.security.ssm_prefix
            )
        })
}

/// Edge parameters as a deployment of `edge` would publish them
pub fn simulated_edge_parameters(edge: &EdgeBuild) -> Result<EdgeParameters> {
    let mut source = StaticParameterSource::new();
    source.register_deployed(&edge.stack, &edge.tree.parameters)?;
    let values: HashMap<String, String> = source.values().clone().into_iter().collect();
    EdgeParameters::from_values(&edge.tree.ssm_prefix, &values)
}

/// Both phases, with phase 2 reading from `source`
pub async fn synth_all(
    config: &SynthConfig,
    source: &impl ParameterSource,
) -> anyhow::Result<Assembly> {
    let edge = build_edge(config)?;
    let params = load_edge_parameters(config, source).await?;
    let app = build_app(config, Some(params))?;
    Ok(Assembly::from_builds(edge, app))
}

/// Both phases without touching AWS: phase 2 sees simulated edge outputs
pub fn synth_offline(config: &SynthConfig) -> Result<Assembly> {
    let edge = build_edge(config)?;
    let params = simulated_edge_parameters(&edge)?;
    let app = build_app(config, Some(params))?;
    Ok(Assembly::from_builds(edge, app))
}

/// One entry per stack in `manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub stack_name: String,
    /// `None` for environment-agnostic stacks
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub template_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_build_file: Option<String>,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub stacks: Vec<ManifestEntry>,
}

/// Synthesized stacks ready to be written out
#[derive(Debug, Default)]
pub struct Assembly {
    stacks: Vec<Stack>,
    edge_builds: BTreeMap<String, BTreeMap<String, String>>,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both stacks, the app stack depending on the edge stack
    pub fn from_builds(edge: EdgeBuild, app: AppBuild) -> Self {
        let mut assembly = Self::new();
        let mut app_stack = app.stack;
        app_stack.add_dependency(edge.stack.name());
        assembly.add_edge(edge);
        assembly.add_stack(app_stack);
        assembly
    }

    pub fn add_stack(&mut self, stack: Stack) {
        self.stacks.push(stack);
    }

    /// Add the edge stack along with its function's build constants
    pub fn add_edge(&mut self, edge: EdgeBuild) {
        self.edge_builds.insert(
            edge.stack.name().to_string(),
            edge.tree.edge_function.build_constants.clone(),
        );
        self.add_stack(edge.stack);
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    pub fn edge_build(&self, stack_name: &str) -> Option<&BTreeMap<String, String>> {
        self.edge_builds.get(stack_name)
    }

    pub fn manifest(&self) -> Manifest {
        let stacks = self
            .stacks
            .iter()
            .map(|stack| ManifestEntry {
                stack_name: stack.name().to_string(),
                region: stack.env().region.clone(),
                account: stack.env().account.clone(),
                template_file: template_file(stack.name()),
                edge_build_file: self
                    .edge_builds
                    .contains_key(stack.name())
                    .then(|| edge_build_file(stack.name())),
                dependencies: stack.dependencies().to_vec(),
            })
            .collect();
        Manifest {
            version: env!("CARGO_PKG_VERSION").to_string(),
            stacks,
        }
    }

    /// Write every artifact into `dir`, returning the paths written
    pub fn write(&self, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let mut written = Vec::new();
        for stack in &self.stacks {
            let path = dir.join(template_file(stack.name()));
            write_json(&path, &stack.to_template())?;
            written.push(path);

            if let Some(constants) = self.edge_builds.get(stack.name()) {
                let path = dir.join(edge_build_file(stack.name()));
                write_json(&path, constants)?;
                written.push(path);
            }
        }

        let path = dir.join(MANIFEST_FILE);
        write_json(&path, &self.manifest())?;
        written.push(path);

        info!(dir = %dir.display(), files = written.len(), "Wrote cloud assembly");
        Ok(written)
    }
}

pub fn template_file(stack_name: &str) -> String {
    format!("{stack_name}.template.json")
}

pub fn edge_build_file(stack_name: &str) -> String {
    format!("{stack_name}.edge-build.json")
}

fn write_json(path: &Path, value: &impl Serialize) -> anyhow::Result<()> {
    let mut content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    content.push('\n');
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), "Wrote artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shieldgate_common::ResourceKind;

    #[test]
    fn test_offline_assembly_links_stacks() {
        let assembly = synth_offline(&SynthConfig::default()).unwrap();
        assert_eq!(assembly.stacks().len(), 2);

        let manifest = assembly.manifest();
        let edge = &manifest.stacks[0];
        let app = &manifest.stacks[1];
        assert_eq!(edge.stack_name, "shieldgate-edge");
        assert_eq!(edge.region.as_deref(), Some("us-east-1"));
        assert_eq!(edge.edge_build_file.as_deref(), Some("shieldgate-edge.edge-build.json"));
        assert_eq!(app.region, None);
        assert_eq!(app.dependencies, vec!["shieldgate-edge".to_string()]);
        assert!(app.edge_build_file.is_none());
    }

    #[test]
    fn test_app_without_edge_generates_secret() {
        let app = build_app(&SynthConfig::default(), None).unwrap();
        assert_eq!(app.stack.count_of(ResourceKind::Secret), 1);
        assert_eq!(app.tree.table.removal_policy, RemovalPolicy::Retain);
    }

    #[test]
    fn test_no_firewall_skips_web_acl() {
        let mut config = SynthConfig::default();
        config.security.no_firewall = true;
        let assembly = synth_offline(&config).unwrap();
        let edge = assembly.stack("shieldgate-edge").unwrap();
        assert_eq!(edge.count_of(ResourceKind::WebAcl), 0);
    }

    #[test]
    fn test_firewall_requires_published_acl() {
        let mut config = SynthConfig::default();
        config.security.no_firewall = true;
        let edge = build_edge(&config).unwrap();
        let params = simulated_edge_parameters(&edge).unwrap();
        assert!(params.waf_acl_arn.is_none());

        config.security.no_firewall = false;
        let err = build_app(&config, Some(params)).unwrap_err();
        assert!(matches!(err, SynthError::MissingParameter { .. }));
    }
}
