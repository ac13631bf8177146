//! Bounded health polling against the freshly started container.
//!
//! A plain fixed-interval retry loop: no exponential backoff, no jitter, no
//! circuit breaker. This tool targets a local or CI docker host where the
//! only question is "has the app finished booting yet" — distributed-systems
//! machinery would be noise. Probe and sleep are trait seams so tests can
//! script responses and run without wall-clock delay.

use std::time::Duration;

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};

// ---------------------------------------------------------------------------
// Probe / Sleep seams
// ---------------------------------------------------------------------------

/// One bounded-timeout HTTP GET. `Ok` carries the status code; `Err` carries
/// a transport-level description (refused, timed out, DNS).
pub trait Probe {
    fn get(&self, url: &str) -> std::result::Result<u16, String>;
}

pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::Probe(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Probe for HttpProbe {
    fn get(&self, url: &str) -> std::result::Result<u16, String> {
        match self.client.get(url).send() {
            Ok(resp) => Ok(resp.status().as_u16()),
            Err(e) => Err(e.to_string()),
        }
    }
}

pub trait Sleep {
    fn sleep(&self, duration: Duration);
}

pub struct WallClock;

impl Sleep for WallClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ---------------------------------------------------------------------------
// HealthPoller
// ---------------------------------------------------------------------------

/// Terminal state of a poll: `Polling → Healthy | Exhausted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Healthy { attempts: u32 },
    Exhausted { attempts: u32 },
}

pub struct HealthPoller {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl HealthPoller {
    pub fn from_config(cfg: &DeployConfig) -> Self {
        Self {
            max_attempts: cfg.health_retries,
            interval: Duration::from_secs(cfg.health_interval_secs),
        }
    }

    /// Probe `url` until a 2xx response or `max_attempts` failures.
    ///
    /// Exactly `max_attempts` probes are issued when every attempt fails;
    /// the sleep runs between attempts only, so a run of N attempts sleeps
    /// N-1 times. `on_attempt` is invoked once per probe with the 1-indexed
    /// attempt number and its result, for run-log visibility.
    pub fn poll(
        &self,
        probe: &dyn Probe,
        sleep: &dyn Sleep,
        url: &str,
        mut on_attempt: impl FnMut(u32, &std::result::Result<u16, String>),
    ) -> PollOutcome {
        for attempt in 1..=self.max_attempts {
            let result = probe.get(url);
            on_attempt(attempt, &result);

            if matches!(result, Ok(status) if is_success(status)) {
                return PollOutcome::Healthy { attempts: attempt };
            }

            if attempt < self.max_attempts {
                sleep.sleep(self.interval);
            }
        }

        PollOutcome::Exhausted {
            attempts: self.max_attempts,
        }
    }
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
