use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Args;

use stevedore_core::config::{DeployConfig, Overrides};
use stevedore_core::health::{HttpProbe, WallClock};
use stevedore_core::pipeline::Deployer;
use stevedore_core::report::DeployStatus;
use stevedore_core::runtime::DockerCli;

use crate::output::{print_json, print_warnings};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct DeployArgs {
    /// Image name (tag is always the deployment id)
    #[arg(long)]
    pub image: Option<String>,

    /// Container name prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Host port to publish
    #[arg(long)]
    pub port: Option<u16>,

    /// Port the app listens on inside the container
    #[arg(long)]
    pub internal_port: Option<u16>,

    /// Environment label (production, staging, ...)
    #[arg(long)]
    pub environment: Option<String>,

    /// Health endpoint path
    #[arg(long)]
    pub health_path: Option<String>,

    /// Maximum health probe attempts
    #[arg(long)]
    pub retries: Option<u32>,

    /// Seconds between health probe attempts
    #[arg(long)]
    pub interval: Option<u64>,

    /// Container memory ceiling (docker size syntax)
    #[arg(long)]
    pub memory: Option<String>,

    /// Container CPU share
    #[arg(long)]
    pub cpus: Option<String>,

    /// Explicit docker binary (default: PATH lookup)
    #[arg(long)]
    pub docker_bin: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, args: DeployArgs, json: bool) -> anyhow::Result<()> {
    let mut cfg = DeployConfig::load_or_default(root).context("failed to load stevedore.yaml")?;
    cfg.apply(Overrides {
        image: args.image,
        container_prefix: args.prefix,
        host_port: args.port,
        container_port: args.internal_port,
        environment: args.environment,
        health_path: args.health_path,
        health_retries: args.retries,
        health_interval_secs: args.interval,
        memory_limit: args.memory,
        cpu_limit: args.cpus,
    });
    cfg.stamp(Utc::now());

    let has_errors = print_warnings(&cfg.validate());
    if has_errors {
        anyhow::bail!("configuration has errors; fix them before deploying");
    }

    let docker = match args.docker_bin {
        Some(bin) => DockerCli::with_binary(bin),
        None => DockerCli::detect()?,
    };
    let probe = HttpProbe::new(Duration::from_secs(cfg.probe_timeout_secs))?;

    let deployer = Deployer {
        runtime: &docker,
        probe: &probe,
        sleep: &WallClock,
        echo: !json,
    };
    let report = deployer.deploy(root, &cfg);

    if json {
        print_json(&report)?;
    }

    if report.status == DeployStatus::Failed {
        anyhow::bail!(
            "deployment {} failed: {}",
            report.deployment_id,
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
