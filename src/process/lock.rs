//! Per-service advisory locking.
//!
//! Two orchestrator invocations mutating the same service would race on its
//! PID file. Each mutating operation therefore holds `<run_dir>/<name>.lock`
//! for its duration: a create-new file containing the owner's PID. A lock
//! whose owner is no longer running is reclaimed; `status` never locks.

use crate::error::{OrchestrateError, Result};
use log::{debug, warn};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ServiceLock {
    service: String,
    path: PathBuf,
}

impl ServiceLock {
    pub fn acquire(run_dir: &Path, service: &str) -> Result<Self> {
        std::fs::create_dir_all(run_dir)?;
        let path = run_dir.join(format!("{}.lock", service));

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    write!(file, "{}", std::process::id())?;
                    debug!("[{}] lock acquired", service);
                    return Ok(Self {
                        service: service.to_string(),
                        path,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let holder = std::fs::read_to_string(&path)
                        .ok()
                        .and_then(|raw| raw.trim().parse::<u32>().ok());
                    match holder {
                        Some(pid) if process_exists(pid) => {
                            return Err(OrchestrateError::LockHeld {
                                service: service.to_string(),
                                holder: pid,
                            });
                        }
                        _ => {
                            // Owner crashed mid-operation. Reclaim, retry once.
                            warn!("[{}] reclaiming stale lock", service);
                            let _ = std::fs::remove_file(&path);
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Lost the reclaim race to another invocation.
        let holder = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(0);
        Err(OrchestrateError::LockHeld {
            service: service.to_string(),
            holder,
        })
    }
}

impl Drop for ServiceLock {
    fn drop(&mut self) {
        debug!("[{}] lock released", self.service);
        let _ = std::fs::remove_file(&self.path);
    }
}

fn process_exists(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}
