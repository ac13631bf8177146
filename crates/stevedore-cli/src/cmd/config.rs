use std::path::Path;

use anyhow::Context;
use clap::Subcommand;
use stevedore_core::config::DeployConfig;

use crate::output::{print_json, print_warnings};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration (file merged with defaults)
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = DeployConfig::load_or_default(root).context("failed to load stevedore.yaml")?;
    if json {
        print_json(&cfg)?;
    } else {
        print!("{}", serde_yaml::to_string(&cfg)?);
    }
    Ok(())
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = DeployConfig::load_or_default(root).context("failed to load stevedore.yaml")?;
    let warnings = cfg.validate();

    let has_errors = if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
        warnings
            .iter()
            .any(|w| w.level == stevedore_core::config::WarnLevel::Error)
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
        false
    } else {
        print_warnings(&warnings)
    };

    if has_errors {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
