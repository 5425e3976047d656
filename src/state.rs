use crate::process::ProcessHandle;
use serde::Serialize;
use std::fmt;

/// Derived view of one service, recomputed on demand from {PID file
/// presence, OS liveness, health probe}. Never persisted anywhere,
/// which is why stale PID files must be detected on every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceRuntimeState {
    Stopped,
    Starting,
    Running,
    Unhealthy,
    Stopping,
    Failed,
}

impl fmt::Display for ServiceRuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceRuntimeState::Stopped => "Stopped",
            ServiceRuntimeState::Starting => "Starting",
            ServiceRuntimeState::Running => "Running",
            ServiceRuntimeState::Unhealthy => "Unhealthy",
            ServiceRuntimeState::Stopping => "Stopping",
            ServiceRuntimeState::Failed => "Failed",
        };
        // pad() keeps width/alignment flags working in table output.
        f.pad(label)
    }
}

/// One row of a status report.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRow {
    pub service: String,
    pub state: ServiceRuntimeState,
    pub pid: Option<u32>,
    pub healthy: bool,
    pub uptime_secs: Option<i64>,
}

impl StatusRow {
    /// Derive a row from what `status` observed. A live process that does
    /// not answer its health endpoint is `Unhealthy`, not `Running`.
    pub fn derive(service: &str, handle: Option<&ProcessHandle>, healthy: bool) -> Self {
        let state = match (handle, healthy) {
            (None, _) => ServiceRuntimeState::Stopped,
            (Some(_), true) => ServiceRuntimeState::Running,
            (Some(_), false) => ServiceRuntimeState::Unhealthy,
        };
        Self {
            service: service.to_string(),
            state,
            pid: handle.map(|h| h.pid),
            healthy,
            uptime_secs: handle.map(|h| h.uptime_secs()),
        }
    }
}
