//! HTTP readiness probing.
//!
//! Process liveness is necessary but not sufficient: a service counts as
//! ready only once its health endpoint answers 200. The bounded attempt
//! budget is what distinguishes "still booting" from "will never become
//! healthy"; callers are never left blocking indefinitely.

use crate::error::Result;
use log::debug;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Per-request budget, so one hung probe cannot blow the attempt window.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a bounded readiness wait.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub ready: bool,
    /// Last HTTP status seen, if the service answered at all.
    pub status: Option<u16>,
    pub attempts: u32,
    pub elapsed: Duration,
}

pub struct HealthPoller {
    client: reqwest::Client,
}

impl HealthPoller {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Single probe, no retry. Used by `status` and by dependency gating.
    pub async fn check_once(&self, host: &str, port: u16, path: &str) -> bool {
        self.probe(host, port, path).await == Some(200)
    }

    /// Poll once per interval until the endpoint answers 200 or the budget
    /// runs out. Anything that is not a 200 (another status, connection
    /// refused, timeout) counts as not-yet-ready.
    pub async fn wait_ready(
        &self,
        host: &str,
        port: u16,
        path: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> HealthCheckResult {
        let begun = Instant::now();
        let mut last_status = None;

        for attempt in 1..=max_attempts {
            last_status = self.probe(host, port, path).await;
            if last_status == Some(200) {
                return HealthCheckResult {
                    ready: true,
                    status: last_status,
                    attempts: attempt,
                    elapsed: begun.elapsed(),
                };
            }
            debug!(
                "probe {}/{} against {}:{} not ready ({:?})",
                attempt, max_attempts, host, port, last_status
            );
            if attempt < max_attempts {
                sleep(interval).await;
            }
        }

        HealthCheckResult {
            ready: false,
            status: last_status,
            attempts: max_attempts,
            elapsed: begun.elapsed(),
        }
    }

    async fn probe(&self, host: &str, port: u16, path: &str) -> Option<u16> {
        let url = format!(
            "http://{}:{}/{}",
            probe_host(host),
            port,
            path.trim_start_matches('/')
        );
        match self.client.get(&url).send().await {
            Ok(response) => Some(response.status().as_u16()),
            Err(_) => None,
        }
    }
}

/// Services bind wildcard addresses; probes reach them via loopback.
fn probe_host(host: &str) -> &str {
    match host {
        "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    }
}
