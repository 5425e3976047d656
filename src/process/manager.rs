//! Process lifecycle: make the OS-level state match the desired state for
//! one service. The PID file is the only memory between invocations.

use crate::config::SystemConfig;
use crate::error::{OrchestrateError, Result};
use crate::process::handle::ProcessHandle;
use crate::process::lock::ServiceLock;
use crate::process::supervisor::ProcessSupervisor;
use crate::registry::ServiceDefinition;
use log::{debug, info, warn};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;

/// Poll cadence while waiting out the stop grace period.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Window for SIGKILL to take effect before we give up.
const KILL_CONFIRM_WINDOW: Duration = Duration::from_millis(500);
const KILL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Whether a stop actually had anything to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDisposition {
    Stopped,
    NotRunning,
}

pub struct ProcessManager<S: ProcessSupervisor> {
    supervisor: S,
    run_dir: PathBuf,
    log_dir: PathBuf,
    stop_grace: Duration,
}

impl<S: ProcessSupervisor> ProcessManager<S> {
    pub fn new(supervisor: S, config: &SystemConfig) -> Self {
        Self {
            supervisor,
            run_dir: config.run_dir.clone(),
            log_dir: config.log_dir.clone(),
            stop_grace: config.stop_grace,
        }
    }

    pub fn pid_path(&self, service: &str) -> PathBuf {
        self.run_dir.join(format!("{}.pid", service))
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    /// Read-only view: the persisted handle, if its process is alive.
    /// Leaves stale PID files untouched; `status` depends on that.
    pub fn inspect(&self, service: &str) -> Option<ProcessHandle> {
        let handle = ProcessHandle::load(service, &self.pid_path(service))?;
        if self.supervisor.is_alive(handle.pid) {
            Some(handle)
        } else {
            None
        }
    }

    /// Liveness check with reconciliation: a PID file whose process is gone
    /// is deleted on the spot. External crashes are the normal failure
    /// mode, so this runs on every check, not just on start.
    pub fn check_running(&self, service: &str) -> Result<Option<ProcessHandle>> {
        let path = self.pid_path(service);
        let Some(handle) = ProcessHandle::load(service, &path) else {
            if path.exists() {
                // Present but unreadable as a PID: same as stale.
                debug!("[{}] removing corrupt PID file", service);
                std::fs::remove_file(&path)?;
            }
            return Ok(None);
        };

        if self.supervisor.is_alive(handle.pid) {
            Ok(Some(handle))
        } else {
            debug!("[{}] removing stale PID file (pid {})", service, handle.pid);
            std::fs::remove_file(&path)?;
            Ok(None)
        }
    }

    /// Spawn the service unless it is already running. Stdout/stderr are
    /// appended to per-service log files and the PID is persisted before
    /// returning.
    pub fn start(&self, def: &ServiceDefinition) -> Result<ProcessHandle> {
        let _lock = ServiceLock::acquire(&self.run_dir, &def.name)?;

        if let Some(handle) = self.check_running(&def.name)? {
            info!("[{}] already running (pid {})", def.name, handle.pid);
            return Ok(handle);
        }

        std::fs::create_dir_all(&self.log_dir)?;
        let stdout = self.open_log(&def.name, "out")?;
        let stderr = self.open_log(&def.name, "err")?;

        let (program, args) = def.command.split_first().ok_or_else(|| {
            OrchestrateError::InvalidRegistry(format!(
                "service '{}' has an empty command",
                def.name
            ))
        })?;

        info!("Spawning [{}]: {} {:?}", def.name, program, args);
        let pid = self
            .supervisor
            .spawn(program, args, stdout, stderr)
            .map_err(|source| OrchestrateError::SpawnError {
                service: def.name.clone(),
                source,
            })?;

        let handle = ProcessHandle::write(&def.name, pid, &self.pid_path(&def.name))?;
        info!("[{}] started (pid {})", def.name, pid);
        Ok(handle)
    }

    /// Graceful stop with bounded escalation: SIGTERM, wait out the grace
    /// period, SIGKILL, confirm. No-op success when not running. The PID
    /// file is removed only once the process is confirmed gone.
    pub async fn stop(&self, def: &ServiceDefinition) -> Result<StopDisposition> {
        let _lock = ServiceLock::acquire(&self.run_dir, &def.name)?;

        let Some(handle) = self.check_running(&def.name)? else {
            info!("[{}] not running", def.name);
            return Ok(StopDisposition::NotRunning);
        };

        info!("Stopping [{}] (pid {})...", def.name, handle.pid);
        self.supervisor.terminate(handle.pid)?;

        let mut waited = Duration::ZERO;
        while waited < self.stop_grace && self.supervisor.is_alive(handle.pid) {
            sleep(STOP_POLL_INTERVAL).await;
            waited += STOP_POLL_INTERVAL;
        }

        if self.supervisor.is_alive(handle.pid) {
            warn!(
                "[{}] still alive after {:?}, sending SIGKILL",
                def.name, self.stop_grace
            );
            self.supervisor.kill(handle.pid)?;

            let mut waited = Duration::ZERO;
            while self.supervisor.is_alive(handle.pid) {
                if waited >= KILL_CONFIRM_WINDOW {
                    return Err(OrchestrateError::StopError {
                        service: def.name.clone(),
                        pid: handle.pid,
                    });
                }
                sleep(KILL_POLL_INTERVAL).await;
                waited += KILL_POLL_INTERVAL;
            }
        }

        std::fs::remove_file(&handle.pid_file)?;
        info!("[{}] stopped", def.name);
        Ok(StopDisposition::Stopped)
    }

    fn open_log(&self, service: &str, stream: &str) -> Result<std::fs::File> {
        let path = self.log_dir.join(format!("{}.{}.log", service, stream));
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::supervisor::UnixSupervisor;

    fn test_config(dir: &std::path::Path) -> SystemConfig {
        SystemConfig {
            run_dir: dir.to_path_buf(),
            log_dir: dir.join("logs"),
            stop_grace: Duration::from_secs(2),
            ..SystemConfig::default()
        }
    }

    fn sleeper_def(name: &str) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            command: vec!["sleep".to_string(), "30".to_string()],
            host: "127.0.0.1".to_string(),
            port: 9000,
            health_path: "/health".to_string(),
            dependencies: Vec::new(),
        }
    }

    fn dead_pid() -> u32 {
        std::process::Command::new("true")
            .spawn()
            .and_then(|mut child| {
                let pid = child.id();
                child.wait().map(|_| pid)
            })
            .expect("spawn and reap")
    }

    #[test]
    fn test_stale_pid_file_is_reconciled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = ProcessManager::new(UnixSupervisor, &test_config(dir.path()));

        let pid_file = manager.pid_path("auth");
        std::fs::write(&pid_file, format!("{}\n", dead_pid())).expect("plant stale pid");

        assert!(manager.check_running("auth").expect("check").is_none());
        assert!(!pid_file.exists(), "stale PID file must be deleted");
    }

    #[test]
    fn test_inspect_leaves_stale_pid_file_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = ProcessManager::new(UnixSupervisor, &test_config(dir.path()));

        let pid_file = manager.pid_path("auth");
        std::fs::write(&pid_file, format!("{}\n", dead_pid())).expect("plant stale pid");

        assert!(manager.inspect("auth").is_none());
        assert!(pid_file.exists(), "inspect must not mutate PID files");
    }

    #[tokio::test]
    async fn test_stop_when_not_running_is_a_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = ProcessManager::new(UnixSupervisor, &test_config(dir.path()));

        let disposition = manager.stop(&sleeper_def("auth")).await.expect("stop");
        assert_eq!(disposition, StopDisposition::NotRunning);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_removes_pid_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = ProcessManager::new(UnixSupervisor, &test_config(dir.path()));
        let def = sleeper_def("auth");

        let first = manager.start(&def).expect("first start");
        let second = manager.start(&def).expect("second start");
        assert_eq!(first.pid, second.pid, "second start must not spawn");

        let disposition = manager.stop(&def).await.expect("stop");
        assert_eq!(disposition, StopDisposition::Stopped);
        assert!(!manager.pid_path("auth").exists());
    }

    #[test]
    fn test_start_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = ProcessManager::new(UnixSupervisor, &test_config(dir.path()));
        let def = ServiceDefinition {
            command: vec!["definitely-not-a-real-binary".to_string()],
            ..sleeper_def("auth")
        };

        match manager.start(&def) {
            Err(OrchestrateError::SpawnError { service, .. }) => assert_eq!(service, "auth"),
            other => panic!("expected SpawnError, got {:?}", other.map(|h| h.pid)),
        }
        assert!(!manager.pid_path("auth").exists());
    }
}
