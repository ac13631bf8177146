//! Container runtime abstraction and the docker CLI implementation.
//!
//! The pipeline only ever talks to [`ContainerRuntime`], so tests swap in an
//! in-memory implementation and the concrete mechanism (subprocess vs. a
//! native SDK) stays replaceable. [`DockerCli`] shells out to the `docker`
//! binary and inspects exit codes and captured output — it implements none
//! of the runtime semantics itself.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};

// ---------------------------------------------------------------------------
// ContainerInfo / RunSpec
// ---------------------------------------------------------------------------

/// A container as reported by the runtime's listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    pub name: String,
    /// Creation time as reported by the runtime, for display only.
    pub created_at: String,
}

/// Everything that goes into the single `run` invocation for the new
/// container: deterministic resource and network constraints.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub name: String,
    pub image_tag: String,
    pub host_port: u16,
    pub container_port: u16,
    pub memory_limit: String,
    pub cpu_limit: String,
    pub read_only: bool,
    pub environment: String,
    pub env: Vec<(String, String)>,
}

impl RunSpec {
    pub fn from_config(cfg: &DeployConfig) -> Self {
        Self {
            name: cfg.container_name(),
            image_tag: cfg.image_tag(),
            host_port: cfg.host_port,
            container_port: cfg.container_port,
            memory_limit: cfg.memory_limit.clone(),
            cpu_limit: cfg.cpu_limit.clone(),
            read_only: cfg.read_only,
            environment: cfg.environment.clone(),
            env: cfg.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ContainerRuntime
// ---------------------------------------------------------------------------

/// The narrow seam between the pipeline and the container runtime.
pub trait ContainerRuntime {
    /// Build an image tagged `tag` from `context`.
    fn build(&self, tag: &str, context: &Path) -> Result<()>;

    /// Start a new detached container per `spec`.
    fn run(&self, spec: &RunSpec) -> Result<()>;

    /// Start an existing (stopped or running) container. Starting a running
    /// container is a no-op, which rollback relies on.
    fn start(&self, name: &str) -> Result<()>;

    fn stop(&self, name: &str) -> Result<()>;

    fn remove(&self, name: &str) -> Result<()>;

    /// Running containers whose name matches `prefix`, most recently
    /// created first. The discoverer takes the head as the rollback target.
    fn list(&self, prefix: &str) -> Result<Vec<ContainerInfo>>;

    /// The last `tail` log lines of a container, for diagnostics.
    fn logs(&self, name: &str, tail: u32) -> Result<String>;

    /// A one-shot resource usage sample (CPU / memory).
    fn stats(&self, name: &str) -> Result<String>;

    /// Remove dangling images older than `until` (runtime filter syntax).
    fn prune_images(&self, until: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// DockerCli
// ---------------------------------------------------------------------------

pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    /// Locate the `docker` binary on PATH.
    pub fn detect() -> Result<Self> {
        let binary = which::which("docker").map_err(|_| DeployError::RuntimeNotFound)?;
        Ok(Self { binary })
    }

    /// Use an explicit binary path instead of PATH lookup.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run `docker <args>`, returning combined captured output on exit 0 and
    /// a [`DeployError::Runtime`] carrying the tool's own error text otherwise.
    fn exec(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DeployError::Runtime {
                command: format!("docker {}", args.join(" ")),
                stderr: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            // docker prints its diagnostics to stderr; fall back to stdout
            let detail = if stderr.trim().is_empty() {
                stdout
            } else {
                stderr
            };
            return Err(DeployError::Runtime {
                command: format!("docker {}", args.join(" ")),
                stderr: tail_capped(detail.trim()).to_string(),
            });
        }

        Ok(combine(&stdout, &stderr))
    }
}

/// Combine stdout and stderr (docker logs interleaves app output across both).
pub(crate) fn combine(stdout: &str, stderr: &str) -> String {
    if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else if stdout.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        format!("{}\n{}", stdout.trim(), stderr.trim())
    }
}

/// Keep the last 10KB of output so a verbose build can't bloat errors or logs.
pub(crate) fn tail_capped(s: &str) -> &str {
    const MAX_OUTPUT: usize = 10 * 1024;
    if s.len() > MAX_OUTPUT {
        let cut = s.len() - MAX_OUTPUT;
        // don't split a UTF-8 sequence
        let mut start = cut;
        while !s.is_char_boundary(start) {
            start += 1;
        }
        &s[start..]
    } else {
        s
    }
}

impl ContainerRuntime for DockerCli {
    fn build(&self, tag: &str, context: &Path) -> Result<()> {
        let context = context.to_string_lossy();
        self.exec(&["build", "-t", tag, context.as_ref()])?;
        Ok(())
    }

    fn run(&self, spec: &RunSpec) -> Result<()> {
        let port_map = format!("{}:{}", spec.host_port, spec.container_port);
        let node_env = format!("NODE_ENV={}", spec.environment);
        let app_env = format!("APP_ENV={}", spec.environment);

        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            spec.name.clone(),
            "--restart".into(),
            "no".into(),
            "-p".into(),
            port_map,
            "--memory".into(),
            spec.memory_limit.clone(),
            "--cpus".into(),
            spec.cpu_limit.clone(),
            "-e".into(),
            node_env,
            "-e".into(),
            app_env,
        ];
        for (k, v) in &spec.env {
            args.push("-e".into());
            args.push(format!("{k}={v}"));
        }
        if spec.read_only {
            args.push("--read-only".into());
            args.push("--tmpfs".into());
            args.push("/tmp:rw,noexec,nosuid,size=64m".into());
        }
        args.push(spec.image_tag.clone());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.exec(&arg_refs)?;
        Ok(())
    }

    fn start(&self, name: &str) -> Result<()> {
        self.exec(&["start", name])?;
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<()> {
        self.exec(&["stop", name])?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.exec(&["rm", "-f", name])?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<ContainerInfo>> {
        // `docker ps` orders newest-first, which is exactly the contract
        let filter = format!("name={prefix}");
        let out = self.exec(&[
            "ps",
            "--filter",
            &filter,
            "--format",
            "{{.Names}}\t{{.CreatedAt}}",
        ])?;

        let mut containers = Vec::new();
        for line in out.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (name, created_at) = match line.split_once('\t') {
                Some((n, c)) => (n.to_string(), c.to_string()),
                None => (line.to_string(), String::new()),
            };
            // the name filter is a substring match; enforce the prefix here
            if name.starts_with(prefix) {
                containers.push(ContainerInfo { name, created_at });
            }
        }
        Ok(containers)
    }

    fn logs(&self, name: &str, tail: u32) -> Result<String> {
        let tail = tail.to_string();
        let out = self.exec(&["logs", "--tail", &tail, name])?;
        Ok(tail_capped(&out).to_string())
    }

    fn stats(&self, name: &str) -> Result<String> {
        self.exec(&[
            "stats",
            "--no-stream",
            "--format",
            "cpu={{.CPUPerc}} mem={{.MemUsage}}",
            name,
        ])
    }

    fn prune_images(&self, until: &str) -> Result<String> {
        let filter = format!("until={until}");
        self.exec(&["image", "prune", "-f", "--filter", &filter])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
