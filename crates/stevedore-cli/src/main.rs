mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stevedore",
    about = "Local container deployment orchestrator — validate, build, swap, health-check, roll back",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from stevedore.yaml or .git/)
    #[arg(long, global = true, env = "STEVEDORE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold stevedore.yaml and the logs directory
    Init,

    /// Run the full deployment pipeline
    Deploy(cmd::deploy::DeployArgs),

    /// Run the pre-flight checks without deploying
    Check,

    /// List running managed containers
    Ps,

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: cmd::config::ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Deploy(args) => cmd::deploy::run(&root, args, cli.json),
        Commands::Check => cmd::check::run(&root, cli.json),
        Commands::Ps => cmd::ps::run(&root, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
