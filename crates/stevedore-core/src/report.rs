use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::DeployConfig;
use crate::error::Result;
use crate::{io, paths};

// ---------------------------------------------------------------------------
// DeployStatus / Containers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Containers {
    /// The container this run started (absent when the pipeline failed
    /// before the deploy stage).
    pub current: Option<String>,
    /// The previously running container discovered for rollback.
    pub previous: Option<String>,
}

// ---------------------------------------------------------------------------
// DeploymentReport
// ---------------------------------------------------------------------------

/// The single JSON record persisted for every terminal run, success or
/// failure. One file per deployment id; assembled once, written once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentReport {
    pub deployment_id: String,
    pub timestamp: String,
    pub config: DeployConfig,
    pub containers: Containers,
    pub log_file: String,
    pub status: DeployStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_success: Option<bool>,
}

impl DeploymentReport {
    /// Serialize to `logs/deployment-report-<id>.json` atomically.
    /// Returns the path written.
    pub fn write(&self, root: &Path) -> Result<PathBuf> {
        let path = paths::report_path(root, &self.deployment_id);
        let json = serde_json::to_string_pretty(self)?;
        io::atomic_write(&path, json.as_bytes())?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(status: DeployStatus) -> DeploymentReport {
        let mut config = DeployConfig::default();
        config.deployment_id = "deploy-20260807-120000".to_string();
        DeploymentReport {
            deployment_id: "deploy-20260807-120000".to_string(),
            timestamp: "2026-08-07T12:00:00Z".to_string(),
            config,
            containers: Containers {
                current: Some("webapp-deploy-20260807-120000".to_string()),
                previous: Some("webapp-deploy-20260806-090000".to_string()),
            },
            log_file: "logs/deployment-deploy-20260807-120000.log".to_string(),
            status,
            error: None,
            rollback_success: None,
        }
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = serde_json::to_string(&report(DeployStatus::Success)).unwrap();
        assert!(json.contains("\"deploymentId\""));
        assert!(json.contains("\"logFile\""));
        assert!(json.contains("\"containers\""));
        assert!(json.contains("\"current\""));
        assert!(json.contains("\"previous\""));
        assert!(json.contains("\"status\":\"success\""));
    }

    #[test]
    fn failed_status_serializes_lowercase() {
        let mut r = report(DeployStatus::Failed);
        r.error = Some("health check failed after 30 attempts".to_string());
        r.rollback_success = Some(false);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"rollbackSuccess\":false"));
        assert!(json.contains("health check failed"));
    }

    #[test]
    fn absent_error_is_omitted() {
        let json = serde_json::to_string(&report(DeployStatus::Success)).unwrap();
        assert!(!json.contains("\"error\""));
        assert!(!json.contains("\"rollbackSuccess\""));
    }

    #[test]
    fn write_creates_one_file_per_id() {
        let dir = TempDir::new().unwrap();
        let path = report(DeployStatus::Success).write(dir.path()).unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("logs/deployment-report-deploy-20260807-120000.json")
        );
        let parsed: DeploymentReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.deployment_id, "deploy-20260807-120000");
        assert_eq!(parsed.status, DeployStatus::Success);
    }

    #[test]
    fn json_roundtrip() {
        let r = report(DeployStatus::Failed);
        let json = serde_json::to_string(&r).unwrap();
        let parsed: DeploymentReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, DeployStatus::Failed);
        assert_eq!(
            parsed.containers.previous.as_deref(),
            Some("webapp-deploy-20260806-090000")
        );
    }
}
