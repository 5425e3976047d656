use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Persistent handle for one started service. The PID file (decimal PID as
/// its entire contents) is the only state that survives between
/// orchestrator invocations.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub service: String,
    pub pid: u32,
    pub pid_file: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl ProcessHandle {
    /// Persist a fresh handle after a successful spawn.
    pub fn write(service: &str, pid: u32, pid_file: &Path) -> io::Result<Self> {
        fs::write(pid_file, format!("{}\n", pid))?;
        Ok(Self {
            service: service.to_string(),
            pid,
            pid_file: pid_file.to_path_buf(),
            started_at: Utc::now(),
        })
    }

    /// Re-read a handle persisted by an earlier invocation. `None` when the
    /// PID file is absent or does not parse as a PID (a corrupt file is
    /// treated like a stale one). The start time is recovered from the
    /// file's mtime.
    pub fn load(service: &str, pid_file: &Path) -> Option<Self> {
        let raw = fs::read_to_string(pid_file).ok()?;
        let pid = raw.trim().parse::<u32>().ok()?;
        let started_at = fs::metadata(pid_file)
            .and_then(|meta| meta.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Some(Self {
            service: service.to_string(),
            pid,
            pid_file: pid_file.to_path_buf(),
            started_at,
        })
    }

    /// Seconds since the recorded start.
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}
