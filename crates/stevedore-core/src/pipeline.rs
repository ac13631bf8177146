//! The deployment pipeline driver.
//!
//! One strictly sequential pass: pre-flight checks → image build → previous
//! container discovery → container swap → bounded health poll → smoke tests
//! → cleanup. Any stage failure aborts the rest, triggers rollback when the
//! new container was already started, and the terminal report is written in
//! every case. There is no concurrency and no cancellation; the only waiting
//! is the fixed-interval sleep inside the health poll.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::health::{HealthPoller, PollOutcome, Probe, Sleep};
use crate::log::{Level, RunLog};
use crate::preflight;
use crate::report::{Containers, DeployStatus, DeploymentReport};
use crate::runtime::{ContainerRuntime, RunSpec};
use crate::smoke;

/// Log lines kept when dumping a failed container's output.
const FAILURE_LOG_TAIL: u32 = 50;

// ---------------------------------------------------------------------------
// Deployer
// ---------------------------------------------------------------------------

/// Drives one deployment over injected runtime/probe/sleep seams.
pub struct Deployer<'a> {
    pub runtime: &'a dyn ContainerRuntime,
    pub probe: &'a dyn Probe,
    pub sleep: &'a dyn Sleep,
    /// Mirror run-log lines to the console.
    pub echo: bool,
}

impl Deployer<'_> {
    /// Run the full pipeline. `cfg.deployment_id` must already be stamped.
    ///
    /// Always returns a terminal report (written to disk best-effort); the
    /// caller maps `status == Failed` to a non-zero exit.
    pub fn deploy(&self, root: &Path, cfg: &DeployConfig) -> DeploymentReport {
        let started = Instant::now();
        let log = if self.echo {
            RunLog::create(root, &cfg.deployment_id)
        } else {
            RunLog::quiet(root, &cfg.deployment_id)
        };

        log.log(
            Level::Info,
            &format!(
                "deployment {} to '{}' starting",
                cfg.deployment_id, cfg.environment
            ),
            Some(&json!({"image": cfg.image_tag(), "container": cfg.container_name()})),
        );

        let mut containers = Containers::default();
        let outcome = self.run_stages(root, cfg, &log, &mut containers);

        let elapsed = started.elapsed().as_secs();
        let (status, error, rollback_success) = match outcome {
            Ok(()) => {
                log.success(&format!("Deployment completed in {elapsed}s"));
                (DeployStatus::Success, None, None)
            }
            Err(e) => {
                log.error(&format!("deployment failed: {e}"));
                // rollback only makes sense once the swap began; before that
                // the previous container was never touched
                let rollback = containers.current.as_deref().map(|current| {
                    self.rollback(cfg, &log, current, containers.previous.as_deref())
                });
                log.error(&format!("Deployment failed after {elapsed}s"));
                (DeployStatus::Failed, Some(e.to_string()), rollback)
            }
        };

        let report = DeploymentReport {
            deployment_id: cfg.deployment_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            config: cfg.clone(),
            containers,
            log_file: log.path().display().to_string(),
            status,
            error,
            rollback_success,
        };

        // the report is best-effort: a write failure must not change the outcome
        match report.write(root) {
            Ok(path) => log.info(&format!("report written to {}", path.display())),
            Err(e) => log.warn(&format!("failed to write deployment report: {e}")),
        }

        report
    }

    fn run_stages(
        &self,
        root: &Path,
        cfg: &DeployConfig,
        log: &RunLog,
        containers: &mut Containers,
    ) -> Result<()> {
        // 1. pre-flight validation
        log.info("running pre-flight checks");
        let results = preflight::run_checks(root, &cfg.preflight);
        for r in &results {
            let level = if r.passed { Level::Info } else { Level::Error };
            log.log(
                level,
                &format!("check '{}': {}", r.name, if r.passed { "ok" } else { "failed" }),
                Some(&json!({"durationMs": r.duration_ms})),
            );
        }
        preflight::ensure_passed(&results)?;

        // 2. image build
        let tag = cfg.image_tag();
        log.info(&format!("building image {tag}"));
        self.runtime.build(&tag, root)?;

        // 3. discover the rollback target
        let previous = self
            .runtime
            .list(&cfg.container_prefix)?
            .into_iter()
            .next()
            .map(|c| c.name);
        match &previous {
            Some(name) => log.info(&format!("previous container: {name}")),
            None => log.warn("no previous container found; rollback will not be possible"),
        }
        containers.previous = previous.clone();

        // 4. stop the previous container so the new one can bind the port
        if let Some(prev) = &previous {
            if let Err(e) = self.runtime.stop(prev) {
                log.warn(&format!("failed to stop previous container {prev}: {e}"));
            }
        }

        // 5. start the new container
        let spec = RunSpec::from_config(cfg);
        log.info(&format!("starting container {}", spec.name));
        containers.current = Some(spec.name.clone());
        self.runtime.run(&spec)?;

        // 6. health poll
        let url = cfg.health_url();
        let poller = HealthPoller::from_config(cfg);
        log.info(&format!(
            "waiting for {url} ({} attempts, {}s interval)",
            poller.max_attempts, cfg.health_interval_secs
        ));
        let outcome = poller.poll(self.probe, self.sleep, &url, |attempt, result| {
            let detail = match result {
                Ok(status) => format!("status {status}"),
                Err(e) => e.clone(),
            };
            log.info(&format!(
                "health attempt {attempt}/{}: {detail}",
                poller.max_attempts
            ));
        });
        match outcome {
            PollOutcome::Healthy { attempts } => {
                log.success(&format!("container healthy after {attempts} attempts"));
            }
            PollOutcome::Exhausted { attempts } => {
                self.dump_container_logs(log, &spec.name);
                return Err(DeployError::HealthExhausted { attempts });
            }
        }

        // 7. smoke tests
        log.info("running smoke tests");
        smoke::run_smoke(self.runtime, self.probe, cfg, &spec.name, log)?;
        log.success("smoke tests passed");

        // 8. success-path cleanup
        cleanup(self.runtime, cfg, log, &spec.name, containers.previous.as_deref());

        Ok(())
    }

    /// Restore the previous container after a failed swap. Never propagates:
    /// the original deployment error must stay the reported failure.
    fn rollback(
        &self,
        cfg: &DeployConfig,
        log: &RunLog,
        current: &str,
        previous: Option<&str>,
    ) -> bool {
        // tear the failed container down first so the port is free again
        if let Err(e) = self.runtime.stop(current) {
            log.warn(&format!("rollback: failed to stop {current}: {e}"));
        }
        if let Err(e) = self.runtime.remove(current) {
            log.warn(&format!("rollback: failed to remove {current}: {e}"));
        }

        let Some(prev) = previous else {
            log.warn("no previous container to roll back to; service remains down");
            return false;
        };

        log.info(&format!("rolling back to {prev}"));
        if let Err(e) = self.runtime.start(prev) {
            log.error(&format!("rollback: failed to start {prev}: {e}"));
            return false;
        }

        let poller = HealthPoller::from_config(cfg);
        match poller.poll(self.probe, self.sleep, &cfg.health_url(), |attempt, result| {
            let detail = match result {
                Ok(status) => format!("status {status}"),
                Err(e) => e.clone(),
            };
            log.info(&format!(
                "rollback health attempt {attempt}/{}: {detail}",
                poller.max_attempts
            ));
        }) {
            PollOutcome::Healthy { .. } => {
                log.success(&format!("rollback complete: {prev} is healthy"));
                true
            }
            PollOutcome::Exhausted { attempts } => {
                log.error(&format!(
                    "rolled-back container {prev} failed health check after {attempts} attempts"
                ));
                false
            }
        }
    }

    fn dump_container_logs(&self, log: &RunLog, name: &str) {
        match self.runtime.logs(name, FAILURE_LOG_TAIL) {
            Ok(tail) => log.log(
                Level::Error,
                &format!("last {FAILURE_LOG_TAIL} log lines of {name}"),
                Some(&json!({ "logs": tail })),
            ),
            Err(e) => log.warn(&format!("could not fetch logs of {name}: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

/// Remove superseded containers and prune old images after a successful
/// swap. Idempotent: already-stopped or already-removed containers are
/// tolerated, so running it twice over the same set never errors.
pub fn cleanup(
    runtime: &dyn ContainerRuntime,
    cfg: &DeployConfig,
    log: &RunLog,
    keep: &str,
    previous: Option<&str>,
) {
    // the stopped previous container no longer shows up in `list`
    if let Some(prev) = previous {
        if prev != keep {
            if let Err(e) = runtime.remove(prev) {
                log.warn(&format!("cleanup: could not remove {prev}: {e}"));
            } else {
                log.info(&format!("removed superseded container {prev}"));
            }
        }
    }

    match runtime.list(&cfg.container_prefix) {
        Ok(others) => {
            for c in others.into_iter().filter(|c| c.name != keep) {
                if let Err(e) = runtime.stop(&c.name) {
                    log.warn(&format!("cleanup: could not stop {}: {e}", c.name));
                }
                if let Err(e) = runtime.remove(&c.name) {
                    log.warn(&format!("cleanup: could not remove {}: {e}", c.name));
                } else {
                    log.info(&format!("removed superseded container {}", c.name));
                }
            }
        }
        Err(e) => log.warn(&format!("cleanup: could not list containers: {e}")),
    }

    match runtime.prune_images(&cfg.prune_until) {
        Ok(_) => log.info(&format!("pruned images older than {}", cfg.prune_until)),
        Err(e) => log.warn(&format!("cleanup: image prune failed: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
