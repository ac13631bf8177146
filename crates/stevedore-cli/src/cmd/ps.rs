use std::path::Path;

use anyhow::Context;
use stevedore_core::config::DeployConfig;
use stevedore_core::runtime::{ContainerRuntime, DockerCli};

use crate::output::{print_json, print_table};

/// List running containers whose name matches the configured prefix,
/// newest first.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = DeployConfig::load_or_default(root).context("failed to load stevedore.yaml")?;
    let docker = DockerCli::detect()?;
    let containers = docker
        .list(&cfg.container_prefix)
        .context("failed to list containers")?;

    if json {
        let value = serde_json::json!({
            "prefix": cfg.container_prefix,
            "containers": containers
                .iter()
                .map(|c| serde_json::json!({"name": c.name, "createdAt": c.created_at}))
                .collect::<Vec<_>>(),
        });
        print_json(&value)?;
    } else if containers.is_empty() {
        println!("No running containers match prefix '{}'.", cfg.container_prefix);
    } else {
        let rows = containers
            .into_iter()
            .map(|c| vec![c.name, c.created_at])
            .collect();
        print_table(&["NAME", "CREATED"], rows);
    }
    Ok(())
}
