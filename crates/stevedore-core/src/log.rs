//! Per-run structured log: an explicit object handed to each stage, not
//! ambient module state. Lines land in `logs/deployment-<id>.log` as
//! `[ISO-timestamp] LEVEL: message {optional-json-data}` and are mirrored
//! to the console. The log is best-effort — a failed append must never
//! abort a deployment, so write errors are downgraded to a tracing warning.

use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::io;
use crate::paths;

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Success,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Success => "SUCCESS",
        }
    }
}

// ---------------------------------------------------------------------------
// RunLog
// ---------------------------------------------------------------------------

pub struct RunLog {
    path: PathBuf,
    echo: bool,
}

impl RunLog {
    /// A log that appends to `logs/deployment-<id>.log` and mirrors lines
    /// to the console.
    pub fn create(root: &Path, deployment_id: &str) -> Self {
        Self {
            path: paths::log_path(root, deployment_id),
            echo: true,
        }
    }

    /// Console mirroring off — used by tests and JSON-output callers.
    pub fn quiet(root: &Path, deployment_id: &str) -> Self {
        Self {
            path: paths::log_path(root, deployment_id),
            echo: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message, None);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message, None);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message, None);
    }

    pub fn success(&self, message: &str) {
        self.log(Level::Success, message, None);
    }

    pub fn log(&self, level: Level, message: &str, data: Option<&Value>) {
        let timestamp = Utc::now().to_rfc3339();
        let line = match data {
            Some(v) => format!("[{timestamp}] {}: {message} {v}\n", level.as_str()),
            None => format!("[{timestamp}] {}: {message}\n", level.as_str()),
        };

        if let Err(e) = io::append_text(&self.path, &line) {
            tracing::warn!("failed to append to run log {}: {e}", self.path.display());
        }

        if self.echo {
            match level {
                Level::Error => eprintln!("[{}] {message}", level.as_str()),
                _ => println!("[{}] {message}", level.as_str()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lines_carry_timestamp_level_and_message() {
        let dir = TempDir::new().unwrap();
        let log = RunLog::quiet(dir.path(), "deploy-20260807-120000");
        log.info("starting deployment");
        log.error("health check failed");

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].contains("INFO: starting deployment"));
        assert!(lines[1].contains("ERROR: health check failed"));
    }

    #[test]
    fn data_payload_is_appended_as_json() {
        let dir = TempDir::new().unwrap();
        let log = RunLog::quiet(dir.path(), "deploy-20260807-120000");
        log.log(
            Level::Info,
            "container started",
            Some(&serde_json::json!({"name": "webapp-deploy-20260807-120000"})),
        );

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("container started {\"name\":\"webapp-deploy-20260807-120000\"}"));
    }

    #[test]
    fn log_file_is_per_deployment_id() {
        let dir = TempDir::new().unwrap();
        let log = RunLog::quiet(dir.path(), "deploy-20260807-120000");
        assert_eq!(
            log.path(),
            dir.path().join("logs/deployment-deploy-20260807-120000.log")
        );
    }

    #[test]
    fn append_failure_does_not_panic() {
        // a directory at the log path makes the append fail
        let dir = TempDir::new().unwrap();
        let log = RunLog::quiet(dir.path(), "deploy-x");
        std::fs::create_dir_all(log.path()).unwrap();
        log.info("this write fails silently");
    }
}
