//! node-bootstrap - prepare an EC2 instance to run a clustered storage node
//!
//! Attaches the node's EBS volume, formats and mounts it, checks it is writable
//! and points a Route 53 record at the instance's private IP.

use anyhow::Context;
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use node_bootstrap::Bootstrap;
use node_bootstrap::cloud::ec2::Ec2Volumes;
use node_bootstrap::cloud::route53::Route53Dns;
use node_bootstrap::config::ConfigOverrides;
use node_bootstrap::config::loader::load_config;
use node_bootstrap::metadata::imds::Imds;
use node_bootstrap::storage::SystemHost;

#[derive(Parser)]
#[command(name = "node-bootstrap")]
#[command(author, version, about = "Attach, mount and advertise the data volume of a storage node", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// YAML config file; flags given on the command line take precedence
    #[arg(long, env = "NODE_BOOTSTRAP_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = load_config(cli.config.as_deref(), &cli.overrides)
        .await
        .context("Invalid configuration")?;

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .load()
        .await;

    let metadata = Imds::new()?;
    let volumes = Ec2Volumes::new(&sdk_config);
    let dns = Route53Dns::new(&sdk_config);
    let host = SystemHost::new();

    let report = Bootstrap::new(&metadata, &volumes, &dns, &host)
        .run(&config)
        .await
        .context("Node bootstrap aborted")?;

    info!(
        "Bootstrap complete: instance {}, volume {}, {:?}, {:?}, dns updated: {}",
        report.context.instance_id,
        report.volume_id.as_deref().unwrap_or("none"),
        report.format,
        report.mount,
        report.dns_updated
    );
    Ok(())
}
