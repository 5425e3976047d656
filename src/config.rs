use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Process-wide settings, resolved once at startup from environment
/// variables with documented defaults. Nothing else in the crate reads the
/// environment after this is built.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Directory holding PID and lock files. One file per service.
    pub run_dir: PathBuf,
    /// Directory holding per-service stdout/stderr logs.
    pub log_dir: PathBuf,

    /// Readiness budget: attempts x interval.
    pub health_attempts: u32,
    pub health_interval: Duration,

    /// Wait after SIGTERM before escalating to SIGKILL.
    pub stop_grace: Duration,
    /// Pause between the stop and start halves of a restart.
    pub settle_delay: Duration,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let run_dir = std::env::temp_dir().join("orchestrate");
        let log_dir = run_dir.join("logs");
        Self {
            run_dir,
            log_dir,
            health_attempts: 30,
            health_interval: Duration::from_secs(1),
            stop_grace: Duration::from_secs(2),
            settle_delay: Duration::from_secs(2),
        }
    }
}

impl SystemConfig {
    /// Build the config from `ORCHESTRATE_*` variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let run_dir = std::env::var("ORCHESTRATE_RUN_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.run_dir);
        let log_dir = std::env::var("ORCHESTRATE_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| run_dir.join("logs"));

        Self {
            run_dir,
            log_dir,
            health_attempts: env_parse("ORCHESTRATE_HEALTH_ATTEMPTS", defaults.health_attempts),
            health_interval: Duration::from_secs(env_parse(
                "ORCHESTRATE_HEALTH_INTERVAL_SECS",
                defaults.health_interval.as_secs(),
            )),
            stop_grace: Duration::from_secs(env_parse(
                "ORCHESTRATE_STOP_GRACE_SECS",
                defaults.stop_grace.as_secs(),
            )),
            settle_delay: Duration::from_secs(env_parse(
                "ORCHESTRATE_SETTLE_SECS",
                defaults.settle_delay.as_secs(),
            )),
        }
    }
}

/// Read an env var or fall back to the default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an env var, falling back on absence or parse failure.
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
