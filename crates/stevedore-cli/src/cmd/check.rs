use std::path::Path;

use anyhow::Context;
use stevedore_core::config::DeployConfig;
use stevedore_core::preflight;

use crate::output::{print_json, print_table};

/// Run the configured pre-flight checks without touching any container.
/// Exits non-zero when a check fails, naming the check.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = DeployConfig::load_or_default(root).context("failed to load stevedore.yaml")?;
    let results = preflight::run_checks(root, &cfg.preflight);

    if json {
        print_json(&results)?;
    } else if results.is_empty() {
        println!("No pre-flight checks configured.");
    } else {
        let rows = results
            .iter()
            .map(|r| {
                let result = if r.passed { "ok" } else { "failed" };
                vec![
                    r.name.clone(),
                    result.to_string(),
                    format!("{}ms", r.duration_ms),
                ]
            })
            .collect();
        print_table(&["CHECK", "RESULT", "DURATION"], rows);
    }

    if let Some(failed) = results.iter().find(|r| !r.passed) {
        if !json && !failed.output.is_empty() {
            eprintln!("{}", failed.output);
        }
        anyhow::bail!("pre-flight check '{}' failed", failed.name);
    }
    Ok(())
}
