//! Pre-deployment validation: a fixed ordered list of shell checks that must
//! all exit 0 before any image is built or container touched. Fail-fast — the
//! first failing check stops the run; there is no aggregation and no partial
//! success.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{DeployError, Result};
use crate::runtime::{combine, tail_capped};

// ---------------------------------------------------------------------------
// CheckDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckDefinition {
    pub name: String,
    pub command: String,
}

impl CheckDefinition {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }

    /// The stock check list: toolchain presence, then lint, then build.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("docker", "docker version --format '{{.Server.Version}}'"),
            Self::new("lint", "npm run lint"),
            Self::new("build", "npm run build"),
        ]
    }
}

// ---------------------------------------------------------------------------
// CheckResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub output: String,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run checks in order, stopping after the first failure. The returned list
/// covers executed checks only; when it ends with a failed entry the
/// remaining checks never ran.
pub fn run_checks(root: &Path, checks: &[CheckDefinition]) -> Vec<CheckResult> {
    let mut results = Vec::new();

    for check in checks {
        let start = std::time::Instant::now();
        let (passed, output) = execute_check(&check.command, root);
        results.push(CheckResult {
            name: check.name.clone(),
            passed,
            output,
            duration_ms: start.elapsed().as_millis() as u64,
        });
        if !passed {
            break;
        }
    }

    results
}

/// Convert a check run into the pipeline's fail-fast error.
pub fn ensure_passed(results: &[CheckResult]) -> Result<()> {
    if let Some(failed) = results.iter().find(|r| !r.passed) {
        return Err(DeployError::Preflight {
            check: failed.name.clone(),
            output: failed.output.clone(),
        });
    }
    Ok(())
}

/// Execute one check via `sh -c` with captured output. Returns
/// (success, combined tail-capped output).
fn execute_check(command: &str, cwd: &Path) -> (bool, String) {
    if command.trim().is_empty() {
        return (false, "check command is empty".to_string());
    }

    let output = match Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
    {
        Ok(o) => o,
        Err(e) => return (false, format!("failed to spawn: {e}")),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = combine(&stdout, &stderr);
    (output.status.success(), tail_capped(&combined).to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, command: &str) -> CheckDefinition {
        CheckDefinition::new(name, command)
    }

    #[test]
    fn all_checks_pass() {
        let checks = vec![check("a", "true"), check("b", "true"), check("c", "true")];
        let results = run_checks(Path::new("/tmp"), &checks);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.passed));
        assert!(ensure_passed(&results).is_ok());
    }

    #[test]
    fn stops_on_first_failure() {
        let checks = vec![check("a", "true"), check("b", "false"), check("c", "true")];
        let results = run_checks(Path::new("/tmp"), &checks);
        assert_eq!(results.len(), 2, "check 'c' must not run");
        assert!(results[0].passed);
        assert!(!results[1].passed);
    }

    #[test]
    fn ensure_passed_names_the_failed_check() {
        let checks = vec![check("lint", "false")];
        let results = run_checks(Path::new("/tmp"), &checks);
        let err = ensure_passed(&results).unwrap_err();
        assert!(err.to_string().contains("'lint'"), "got: {err}");
    }

    #[test]
    fn captures_stdout() {
        let checks = vec![check("version", "echo '27.3.1'")];
        let results = run_checks(Path::new("/tmp"), &checks);
        assert!(results[0].passed);
        assert_eq!(results[0].output, "27.3.1");
    }

    #[test]
    fn captures_stderr_on_failure() {
        let checks = vec![check("build", "echo 'compile error' >&2 && false")];
        let results = run_checks(Path::new("/tmp"), &checks);
        assert!(!results[0].passed);
        assert_eq!(results[0].output, "compile error");
    }

    #[test]
    fn empty_command_fails_immediately() {
        let checks = vec![check("bad", "   ")];
        let results = run_checks(Path::new("/tmp"), &checks);
        assert!(!results[0].passed);
        assert!(results[0].output.contains("empty"));
    }

    #[test]
    fn no_checks_is_a_pass() {
        let results = run_checks(Path::new("/tmp"), &[]);
        assert!(results.is_empty());
        assert!(ensure_passed(&results).is_ok());
    }

    #[test]
    fn duration_is_recorded() {
        let checks = vec![check("sleep", "sleep 0.1")];
        let results = run_checks(Path::new("/tmp"), &checks);
        assert!(results[0].passed);
        assert!(results[0].duration_ms >= 50);
    }

    #[test]
    fn defaults_start_with_the_toolchain_probe() {
        let defaults = CheckDefinition::defaults();
        assert_eq!(defaults[0].name, "docker");
        assert!(defaults.len() >= 3);
    }

    #[test]
    fn definition_rejects_unknown_fields() {
        let yaml = "name: lint\ncommand: npm run lint\nretries: 3\n";
        assert!(serde_yaml::from_str::<CheckDefinition>(yaml).is_err());
    }

    #[test]
    fn definition_yaml_roundtrip() {
        let def = check("lint", "npm run lint");
        let yaml = serde_yaml::to_string(&def).unwrap();
        let parsed: CheckDefinition = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, def);
    }
}
