//! Post-deployment smoke tests: a short fixed battery run once the health
//! poll has passed. Checks are independent and run in order; the first
//! failure aborts with the check's name. All must pass.

use std::time::Instant;

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::health::{is_success, Probe};
use crate::log::RunLog;
use crate::runtime::ContainerRuntime;

/// Run the battery against the freshly deployed container:
/// 1. `health` — the endpoint must still answer 2xx.
/// 2. `latency` — one probe round-trip must finish under the threshold.
/// 3. `stats` — a resource usage sample must be obtainable (recorded in
///    the run log for the operator).
pub fn run_smoke(
    runtime: &dyn ContainerRuntime,
    probe: &dyn Probe,
    cfg: &DeployConfig,
    container: &str,
    log: &RunLog,
) -> Result<()> {
    let url = cfg.health_url();

    // health recheck
    match probe.get(&url) {
        Ok(status) if is_success(status) => {
            log.info(&format!("smoke health: {status}"));
        }
        Ok(status) => {
            return Err(DeployError::Smoke {
                check: "health".to_string(),
                reason: format!("endpoint answered {status}"),
            });
        }
        Err(e) => {
            return Err(DeployError::Smoke {
                check: "health".to_string(),
                reason: e,
            });
        }
    }

    // latency
    let start = Instant::now();
    let result = probe.get(&url);
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(status) if is_success(status) => {
            if elapsed_ms > cfg.latency_threshold_ms {
                return Err(DeployError::Smoke {
                    check: "latency".to_string(),
                    reason: format!(
                        "round-trip {elapsed_ms}ms exceeds threshold {}ms",
                        cfg.latency_threshold_ms
                    ),
                });
            }
            log.info(&format!("smoke latency: {elapsed_ms}ms"));
        }
        Ok(status) => {
            return Err(DeployError::Smoke {
                check: "latency".to_string(),
                reason: format!("endpoint answered {status}"),
            });
        }
        Err(e) => {
            return Err(DeployError::Smoke {
                check: "latency".to_string(),
                reason: e,
            });
        }
    }

    // resource usage
    match runtime.stats(container) {
        Ok(sample) => {
            log.info(&format!("smoke stats: {}", sample.trim()));
        }
        Err(e) => {
            return Err(DeployError::Smoke {
                check: "stats".to_string(),
                reason: e.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerInfo, RunSpec};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::Path;

    struct ScriptedProbe {
        script: RefCell<VecDeque<std::result::Result<u16, String>>>,
    }

    impl ScriptedProbe {
        fn new(results: Vec<std::result::Result<u16, String>>) -> Self {
            Self {
                script: RefCell::new(results.into()),
            }
        }
    }

    impl Probe for ScriptedProbe {
        fn get(&self, _url: &str) -> std::result::Result<u16, String> {
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err("script exhausted".to_string()))
        }
    }

    struct StatsOnlyRuntime {
        stats: std::result::Result<String, String>,
    }

    impl ContainerRuntime for StatsOnlyRuntime {
        fn build(&self, _: &str, _: &Path) -> Result<()> {
            unreachable!("smoke tests never build")
        }
        fn run(&self, _: &RunSpec) -> Result<()> {
            unreachable!()
        }
        fn start(&self, _: &str) -> Result<()> {
            unreachable!()
        }
        fn stop(&self, _: &str) -> Result<()> {
            unreachable!()
        }
        fn remove(&self, _: &str) -> Result<()> {
            unreachable!()
        }
        fn list(&self, _: &str) -> Result<Vec<ContainerInfo>> {
            unreachable!()
        }
        fn logs(&self, _: &str, _: u32) -> Result<String> {
            unreachable!()
        }
        fn stats(&self, _: &str) -> Result<String> {
            self.stats.clone().map_err(|e| DeployError::Runtime {
                command: "docker stats".to_string(),
                stderr: e,
            })
        }
        fn prune_images(&self, _: &str) -> Result<String> {
            unreachable!()
        }
    }

    fn quiet_log(dir: &tempfile::TempDir) -> RunLog {
        RunLog::quiet(dir.path(), "deploy-test")
    }

    #[test]
    fn all_checks_pass() {
        let dir = tempfile::TempDir::new().unwrap();
        let runtime = StatsOnlyRuntime {
            stats: Ok("cpu=1.2% mem=120MiB / 512MiB".to_string()),
        };
        let probe = ScriptedProbe::new(vec![Ok(200), Ok(200)]);
        let cfg = DeployConfig::default();
        run_smoke(&runtime, &probe, &cfg, "webapp-x", &quiet_log(&dir)).unwrap();
    }

    #[test]
    fn failed_health_recheck_names_the_check() {
        let dir = tempfile::TempDir::new().unwrap();
        let runtime = StatsOnlyRuntime {
            stats: Ok(String::new()),
        };
        let probe = ScriptedProbe::new(vec![Ok(500)]);
        let cfg = DeployConfig::default();
        let err = run_smoke(&runtime, &probe, &cfg, "webapp-x", &quiet_log(&dir)).unwrap_err();
        assert!(matches!(err, DeployError::Smoke { ref check, .. } if check == "health"));
    }

    #[test]
    fn latency_over_threshold_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let runtime = StatsOnlyRuntime {
            stats: Ok(String::new()),
        };
        let probe = ScriptedProbe::new(vec![Ok(200), Ok(200)]);
        let mut cfg = DeployConfig::default();
        cfg.latency_threshold_ms = 0;
        let err = run_smoke(&runtime, &probe, &cfg, "webapp-x", &quiet_log(&dir)).unwrap_err();
        assert!(matches!(err, DeployError::Smoke { ref check, .. } if check == "latency"));
    }

    #[test]
    fn stats_failure_fails_the_battery() {
        let dir = tempfile::TempDir::new().unwrap();
        let runtime = StatsOnlyRuntime {
            stats: Err("no such container".to_string()),
        };
        let probe = ScriptedProbe::new(vec![Ok(200), Ok(200)]);
        let cfg = DeployConfig::default();
        let err = run_smoke(&runtime, &probe, &cfg, "webapp-x", &quiet_log(&dir)).unwrap_err();
        assert!(matches!(err, DeployError::Smoke { ref check, .. } if check == "stats"));
    }

    #[test]
    fn transport_error_during_recheck_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let runtime = StatsOnlyRuntime {
            stats: Ok(String::new()),
        };
        let probe = ScriptedProbe::new(vec![Err("connection reset".to_string())]);
        let cfg = DeployConfig::default();
        let err = run_smoke(&runtime, &probe, &cfg, "webapp-x", &quiet_log(&dir)).unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
