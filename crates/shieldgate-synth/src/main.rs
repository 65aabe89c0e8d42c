//! shieldgate-synth: synthesizes the edge and app CloudFormation stacks
//!
//! `edge` writes the us-east-1 security stack, `app` writes the application
//! stack wired to an already deployed edge stack, and `all` writes both.

use anyhow::Result;
use clap::{Parser, Subcommand};
use shieldgate_common::defaults::{
    DEFAULT_RATE_LIMIT, DEFAULT_ROTATION_DAYS, DEFAULT_SSM_PREFIX, REQUIRED_EDGE_REGION,
};
use shieldgate_synth::aws::{
    AwsContext, SsmParameterSource, classify_anyhow_error, get_current_account_id,
};
use shieldgate_synth::params::{EdgeParameters, StaticParameterSource};
use shieldgate_synth::pipeline::{self, Assembly};
use shieldgate_synth::{SynthError, config};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "shieldgate-synth")]
#[command(about = "Synthesize the shieldgate edge and app stacks")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every subcommand
#[derive(clap::Args, Debug)]
struct SynthArgs {
    /// Output directory for templates and manifest.json
    #[arg(short, long, default_value = "cdk.out")]
    out: PathBuf,

    /// Prefix for the stack names (<prefix>-edge, <prefix>-app)
    #[arg(long, default_value = "shieldgate")]
    stack_prefix: String,

    /// Region of the edge stack
    #[arg(long, default_value = REQUIRED_EDGE_REGION)]
    edge_region: String,

    /// Region of the app stack (environment-agnostic when omitted)
    #[arg(long, env = "APP_REGION")]
    app_region: Option<String>,

    /// Custom domain for the site
    #[arg(long, env = "DOMAIN_NAME")]
    domain_name: Option<String>,

    /// Comma-separated extra domain names for the distribution
    #[arg(long, env = "ALTERNATE_DOMAIN_NAMES", value_delimiter = ',')]
    alternate_domain_names: Vec<String>,

    /// Route 53 hosted zone id for DNS records and certificate validation
    #[arg(long, env = "HOSTED_ZONE_ID")]
    hosted_zone_id: Option<String>,

    /// Route 53 hosted zone name
    #[arg(long, env = "HOSTED_ZONE_NAME")]
    hosted_zone_name: Option<String>,

    /// Existing us-east-1 certificate for the custom domain
    #[arg(long, env = "CERTIFICATE_ARN")]
    certificate_arn: Option<String>,

    /// Parameter-store prefix shared by both stacks
    #[arg(long, env = "SSM_PREFIX", default_value = DEFAULT_SSM_PREFIX)]
    ssm_prefix: String,

    /// Requests per client IP per 5 minutes (0 drops the rate rule)
    #[arg(long, env = "WAF_RATE_LIMIT", default_value_t = DEFAULT_RATE_LIMIT)]
    waf_rate_limit: u32,

    /// Origin secret rotation interval in days
    #[arg(long, env = "ROTATION_DAYS", default_value_t = DEFAULT_ROTATION_DAYS)]
    rotation_days: u32,

    /// Omit the web ACL
    #[arg(long)]
    no_firewall: bool,

    /// Delete tables, buckets and secrets with the stack
    #[arg(long)]
    destroy_on_delete: bool,

    /// Pin the caller's account into both stacks
    #[arg(long)]
    resolve_account: bool,

    /// JSON map of parameter name to value, read instead of SSM
    #[arg(long)]
    params_file: Option<PathBuf>,

    /// Use simulated edge outputs instead of reading deployed ones
    #[arg(long)]
    offline: bool,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,
}

impl From<SynthArgs> for config::SynthConfig {
    fn from(args: SynthArgs) -> Self {
        let alternate_domain_names = args
            .alternate_domain_names
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            stacks: config::StackConfig {
                out_dir: args.out,
                stack_prefix: args.stack_prefix,
                edge_region: args.edge_region,
                app_region: args.app_region,
                account: None,
                aws_profile: args.aws_profile,
            },
            domain: config::DomainConfig {
                domain_name: args.domain_name,
                alternate_domain_names,
                hosted_zone_id: args.hosted_zone_id,
                hosted_zone_name: args.hosted_zone_name,
                certificate_arn: args.certificate_arn,
            },
            security: config::SecurityConfig {
                ssm_prefix: args.ssm_prefix,
                waf_rate_limit: args.waf_rate_limit,
                rotation_days: args.rotation_days,
                no_firewall: args.no_firewall,
            },
            flags: config::SynthFlags {
                destroy_on_delete: args.destroy_on_delete,
                resolve_account: args.resolve_account,
                params_file: args.params_file,
                offline: args.offline,
            },
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize the edge security stack
    Edge(Box<SynthArgs>),

    /// Synthesize the app stack against the deployed edge stack
    App(Box<SynthArgs>),

    /// Synthesize both stacks
    All(Box<SynthArgs>),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    let suggestion = match e.downcast_ref::<SynthError>() {
        Some(SynthError::MissingParameter { .. }) => {
            Some("Deploy the edge stack first, or pass --offline to use simulated values.")
        }
        Some(_) => None,
        None => classify_anyhow_error(e).suggestion(),
    };
    if let Some(hint) = suggestion {
        let _ = writeln!(stderr, "\n\x1b[36mHint:\x1b[0m {hint}");
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                // Reduce noise from the AWS SDK
                .add_directive("aws_config=warn".parse()?)
                .add_directive("aws_smithy_runtime=warn".parse()?)
                .add_directive("aws_sdk_ssm=warn".parse()?)
                .add_directive("aws_sdk_sts=warn".parse()?),
        )
        .init();

    let (config, assembly) = match args.command {
        Command::Edge(a) => {
            let config = prepare(*a, "edge").await?;
            let mut assembly = Assembly::new();
            assembly.add_edge(pipeline::build_edge(&config)?);
            (config, assembly)
        }
        Command::App(a) => {
            let config = prepare(*a, "app").await?;
            let params = edge_parameters(&config).await?;
            let mut app = pipeline::build_app(&config, Some(params))?;
            app.stack.add_dependency(config.edge_stack_name());
            let mut assembly = Assembly::new();
            assembly.add_stack(app.stack);
            (config, assembly)
        }
        Command::All(a) => {
            let config = prepare(*a, "all").await?;
            let assembly = if config.flags.offline {
                pipeline::synth_offline(&config)?
            } else {
                match &config.flags.params_file {
                    Some(path) => {
                        let source = StaticParameterSource::from_file(path)?;
                        pipeline::synth_all(&config, &source).await?
                    }
                    None => {
                        let source = ssm_source(&config).await;
                        pipeline::synth_all(&config, &source).await?
                    }
                }
            };
            (config, assembly)
        }
    };

    for path in assembly.write(config.out_dir())? {
        println!("{}", path.display());
    }
    Ok(())
}

/// Validate arguments and pin the account when asked
async fn prepare(args: SynthArgs, command: &str) -> Result<config::SynthConfig> {
    let mut config: config::SynthConfig = args.into();
    config.validate()?;

    if config.flags.resolve_account {
        let ctx = AwsContext::new(&config.stacks.edge_region, config.aws_profile()).await;
        let account = get_current_account_id(&ctx).await?;
        info!(account = %account, "Pinning stack account");
        config.stacks.account = Some(account.to_string());
    }

    info!(
        command,
        prefix = %config.stacks.stack_prefix,
        edge_region = %config.stacks.edge_region,
        app_region = config.stacks.app_region.as_deref().unwrap_or("<agnostic>"),
        ssm_prefix = %config.security.ssm_prefix,
        "Starting synthesis"
    );
    Ok(config)
}

async fn ssm_source(config: &config::SynthConfig) -> SsmParameterSource {
    let ctx = AwsContext::new(&config.stacks.edge_region, config.aws_profile()).await;
    SsmParameterSource::from_context(&ctx)
}

/// Edge parameters for a standalone `app` run
async fn edge_parameters(config: &config::SynthConfig) -> Result<EdgeParameters> {
    if config.flags.offline {
        let edge = pipeline::build_edge(config)?;
        return Ok(pipeline::simulated_edge_parameters(&edge)?);
    }
    match &config.flags.params_file {
        Some(path) => {
            let source = StaticParameterSource::from_file(path)?;
            pipeline::load_edge_parameters(config, &source).await
        }
        None => {
            let source = ssm_source(config).await;
            pipeline::load_edge_parameters(config, &source).await
        }
    }
}
