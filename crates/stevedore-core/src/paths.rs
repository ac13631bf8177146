use crate::error::{DeployError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const LOGS_DIR: &str = "logs";
pub const CONFIG_FILE: &str = "stevedore.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn logs_dir(root: &Path) -> PathBuf {
    root.join(LOGS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// `logs/deployment-<id>.log` — the per-run append-only log.
pub fn log_path(root: &Path, deployment_id: &str) -> PathBuf {
    logs_dir(root).join(format!("deployment-{deployment_id}.log"))
}

/// `logs/deployment-report-<id>.json` — the single terminal report.
pub fn report_path(root: &Path, deployment_id: &str) -> PathBuf {
    logs_dir(root).join(format!("deployment-report-{deployment_id}.json"))
}

// ---------------------------------------------------------------------------
// Container prefix validation
// ---------------------------------------------------------------------------

static PREFIX_RE: OnceLock<Regex> = OnceLock::new();

fn prefix_re() -> &'static Regex {
    PREFIX_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// The prefix names every container this tool manages, so it must be a
/// valid docker name fragment and short enough to leave room for the
/// deployment id suffix.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() || prefix.len() > 48 || !prefix_re().is_match(prefix) {
        return Err(DeployError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
