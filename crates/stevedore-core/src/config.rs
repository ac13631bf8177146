use crate::error::Result;
use crate::paths;
use crate::preflight::CheckDefinition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// DeployConfig
// ---------------------------------------------------------------------------

/// The single configuration record for one deployment run.
///
/// Built once at process start from `stevedore.yaml` (all fields optional,
/// falling back to defaults) plus CLI overrides, then read-only for the
/// rest of the run. The deployment id is stamped separately via
/// [`DeployConfig::stamp`] so config files never carry one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// Image name without tag; the deployment id becomes the tag.
    #[serde(default = "default_image")]
    pub image: String,

    /// Name prefix for every container this tool manages.
    #[serde(default = "default_prefix")]
    pub container_prefix: String,

    #[serde(default = "default_port")]
    pub host_port: u16,

    #[serde(default = "default_port")]
    pub container_port: u16,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Maximum health probe attempts before giving up.
    #[serde(default = "default_health_retries")]
    pub health_retries: u32,

    /// Fixed sleep between health probe attempts.
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    /// Per-probe HTTP timeout.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Smoke test fails when a probe round-trip exceeds this.
    #[serde(default = "default_latency_threshold")]
    pub latency_threshold_ms: u64,

    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,

    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: String,

    /// Run the container with a read-only root filesystem and a tmpfs /tmp.
    #[serde(default = "default_read_only")]
    pub read_only: bool,

    /// Environment label passed to the container as NODE_ENV/APP_ENV.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Extra environment variables for the container.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Pre-flight checks, run in order before anything is built.
    #[serde(default = "CheckDefinition::defaults")]
    pub preflight: Vec<CheckDefinition>,

    /// Age filter for image pruning on the success path (docker `until=` syntax).
    #[serde(default = "default_prune_until")]
    pub prune_until: String,

    /// Timestamp-derived id for this run; never read from the config file.
    #[serde(skip)]
    pub deployment_id: String,
}

fn default_image() -> String {
    "webapp".to_string()
}

fn default_prefix() -> String {
    "webapp".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_health_path() -> String {
    "/api/health".to_string()
}

fn default_health_retries() -> u32 {
    30
}

fn default_health_interval() -> u64 {
    2
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_latency_threshold() -> u64 {
    1000
}

fn default_memory_limit() -> String {
    "512m".to_string()
}

fn default_cpu_limit() -> String {
    "1.5".to_string()
}

fn default_read_only() -> bool {
    true
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_prune_until() -> String {
    "168h".to_string()
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            container_prefix: default_prefix(),
            host_port: default_port(),
            container_port: default_port(),
            health_path: default_health_path(),
            health_retries: default_health_retries(),
            health_interval_secs: default_health_interval(),
            probe_timeout_secs: default_probe_timeout(),
            latency_threshold_ms: default_latency_threshold(),
            memory_limit: default_memory_limit(),
            cpu_limit: default_cpu_limit(),
            read_only: default_read_only(),
            environment: default_environment(),
            env: BTreeMap::new(),
            preflight: CheckDefinition::defaults(),
            prune_until: default_prune_until(),
            deployment_id: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Overrides (from the CLI)
// ---------------------------------------------------------------------------

/// Optional per-flag overrides applied on top of the file config.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub image: Option<String>,
    pub container_prefix: Option<String>,
    pub host_port: Option<u16>,
    pub container_port: Option<u16>,
    pub environment: Option<String>,
    pub health_path: Option<String>,
    pub health_retries: Option<u32>,
    pub health_interval_secs: Option<u64>,
    pub memory_limit: Option<String>,
    pub cpu_limit: Option<String>,
}

impl DeployConfig {
    /// Load `stevedore.yaml` from `root`, or the built-in defaults when the
    /// file doesn't exist.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: DeployConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.image {
            self.image = v;
        }
        if let Some(v) = overrides.container_prefix {
            self.container_prefix = v;
        }
        if let Some(v) = overrides.host_port {
            self.host_port = v;
        }
        if let Some(v) = overrides.container_port {
            self.container_port = v;
        }
        if let Some(v) = overrides.environment {
            self.environment = v;
        }
        if let Some(v) = overrides.health_path {
            self.health_path = v;
        }
        if let Some(v) = overrides.health_retries {
            self.health_retries = v;
        }
        if let Some(v) = overrides.health_interval_secs {
            self.health_interval_secs = v;
        }
        if let Some(v) = overrides.memory_limit {
            self.memory_limit = v;
        }
        if let Some(v) = overrides.cpu_limit {
            self.cpu_limit = v;
        }
    }

    /// Stamp the run's deployment id from a timestamp.
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        self.deployment_id = deployment_id_from(now);
    }

    /// The image tag for this run: `<image>:<deployment-id>`.
    pub fn image_tag(&self) -> String {
        format!("{}:{}", self.image, self.deployment_id)
    }

    /// The new container's name: `<prefix>-<deployment-id>`.
    pub fn container_name(&self) -> String {
        format!("{}-{}", self.container_prefix, self.deployment_id)
    }

    /// The health endpoint URL on the host side of the port mapping.
    pub fn health_url(&self) -> String {
        format!("http://localhost:{}{}", self.host_port, self.health_path)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if paths::validate_prefix(&self.container_prefix).is_err() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "invalid containerPrefix '{}': must be lowercase alphanumeric with hyphens",
                    self.container_prefix
                ),
            });
        }

        if self.health_retries == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "healthRetries is 0: the new container can never be declared healthy"
                    .to_string(),
            });
        }

        if self.health_interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "healthIntervalSecs is 0: probes will hammer the endpoint back-to-back"
                    .to_string(),
            });
        }

        if !is_docker_size(&self.memory_limit) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "memoryLimit '{}' does not look like a docker size (e.g. 512m, 2g)",
                    self.memory_limit
                ),
            });
        }

        if self.cpu_limit.parse::<f64>().is_err() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("cpuLimit '{}' is not a number", self.cpu_limit),
            });
        }

        if self.preflight.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "preflight is empty: deployments will start without validation"
                    .to_string(),
            });
        }

        for check in &self.preflight {
            if check.command.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("preflight check '{}' has an empty command", check.name),
                });
            }
        }

        warnings
    }
}

fn is_docker_size(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    let Some(last) = s.chars().last() else {
        return false;
    };
    let digits = if matches!(last, 'b' | 'k' | 'm' | 'g') {
        &s[..s.len() - 1]
    } else {
        s.as_str()
    };
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Derive the run identifier from a timestamp: `deploy-YYYYMMDD-HHMMSS`.
pub fn deployment_id_from(now: DateTime<Utc>) -> String {
    now.format("deploy-%Y%m%d-%H%M%S").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_config_roundtrip() {
        let cfg = DeployConfig::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: DeployConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.image, "webapp");
        assert_eq!(parsed.host_port, 3000);
        assert_eq!(parsed.health_retries, 30);
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let cfg: DeployConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.container_prefix, "webapp");
        assert_eq!(cfg.health_path, "/api/health");
        assert_eq!(cfg.memory_limit, "512m");
        assert!(!cfg.preflight.is_empty());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "image: shop-api\nhostPort: 8080\n";
        let cfg: DeployConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.image, "shop-api");
        assert_eq!(cfg.host_port, 8080);
        assert_eq!(cfg.container_port, 3000);
        assert_eq!(cfg.environment, "production");
    }

    #[test]
    fn deployment_id_is_not_read_from_yaml() {
        let yaml = "image: shop-api\n";
        let cfg: DeployConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.deployment_id.is_empty());
    }

    #[test]
    fn stamp_derives_id_from_timestamp() {
        let mut cfg = DeployConfig::default();
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 14, 30, 5).unwrap();
        cfg.stamp(now);
        assert_eq!(cfg.deployment_id, "deploy-20260807-143005");
        assert_eq!(cfg.image_tag(), "webapp:deploy-20260807-143005");
        assert_eq!(cfg.container_name(), "webapp-deploy-20260807-143005");
    }

    #[test]
    fn health_url_uses_host_port() {
        let mut cfg = DeployConfig::default();
        cfg.host_port = 8080;
        cfg.health_path = "/healthz".to_string();
        assert_eq!(cfg.health_url(), "http://localhost:8080/healthz");
    }

    #[test]
    fn overrides_apply_only_when_set() {
        let mut cfg = DeployConfig::default();
        cfg.apply(Overrides {
            image: Some("shop-api".to_string()),
            host_port: Some(8080),
            environment: Some("staging".to_string()),
            ..Default::default()
        });
        assert_eq!(cfg.image, "shop-api");
        assert_eq!(cfg.host_port, 8080);
        assert_eq!(cfg.environment, "staging");
        // untouched fields keep their defaults
        assert_eq!(cfg.container_port, 3000);
        assert_eq!(cfg.health_retries, 30);
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = DeployConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.image, "webapp");
    }

    #[test]
    fn load_or_default_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("stevedore.yaml"),
            "image: shop-api\ncontainerPrefix: shop\n",
        )
        .unwrap();
        let cfg = DeployConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.image, "shop-api");
        assert_eq!(cfg.container_prefix, "shop");
    }

    #[test]
    fn validate_default_config_no_warnings() {
        let cfg = DeployConfig::default();
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn validate_bad_prefix_is_error() {
        let mut cfg = DeployConfig::default();
        cfg.container_prefix = "Bad Prefix".to_string();
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("containerPrefix")));
    }

    #[test]
    fn validate_zero_retries_is_error() {
        let mut cfg = DeployConfig::default();
        cfg.health_retries = 0;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("healthRetries")));
    }

    #[test]
    fn validate_odd_memory_limit_warns() {
        let mut cfg = DeployConfig::default();
        cfg.memory_limit = "lots".to_string();
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.message.contains("memoryLimit")));
    }

    #[test]
    fn validate_empty_preflight_warns() {
        let mut cfg = DeployConfig::default();
        cfg.preflight.clear();
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.message.contains("preflight is empty")));
    }

    #[test]
    fn docker_size_accepts_plain_bytes_and_units() {
        assert!(is_docker_size("512m"));
        assert!(is_docker_size("2g"));
        assert!(is_docker_size("1048576"));
        assert!(!is_docker_size("2gb"));
        assert!(!is_docker_size("m"));
        assert!(!is_docker_size(""));
    }
}
