use std::path::Path;

use anyhow::Context;
use stevedore_core::config::DeployConfig;
use stevedore_core::{io, paths};

/// Scaffold the project: a `stevedore.yaml` with the stock defaults and the
/// `logs/` directory reports and run logs land in. Idempotent — an existing
/// config file is left untouched.
pub fn run(root: &Path) -> anyhow::Result<()> {
    io::ensure_dir(&paths::logs_dir(root)).context("failed to create logs directory")?;

    let config_path = paths::config_path(root);
    let yaml = serde_yaml::to_string(&DeployConfig::default())
        .context("failed to serialize default config")?;
    let written = io::write_if_missing(&config_path, yaml.as_bytes())
        .context("failed to write stevedore.yaml")?;

    if written {
        println!("Initialized {}", config_path.display());
    } else {
        println!("{} already exists, leaving it alone", config_path.display());
    }
    Ok(())
}
