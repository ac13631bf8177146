use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("container runtime not found: install docker or pass --docker-bin")]
    RuntimeNotFound,

    #[error("{command} failed: {stderr}")]
    Runtime { command: String, stderr: String },

    #[error("pre-deployment validation failed at '{check}': {output}")]
    Preflight { check: String, output: String },

    #[error("health check failed after {attempts} attempts")]
    HealthExhausted { attempts: u32 },

    #[error("smoke test '{check}' failed: {reason}")]
    Smoke { check: String, reason: String },

    #[error("invalid container prefix '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidPrefix(String),

    #[error("health probe error: {0}")]
    Probe(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;
