use std::fs::File;
use std::io;
use std::process::{Command, Stdio};

/// The abstraction for "The Hands": spawning, signalling, liveness.
/// Implement this per platform (or with a recording double in tests) so the
/// lifecycle manager and the engine stay platform-agnostic.
pub trait ProcessSupervisor: Send + Sync {
    /// Launch the program detached from the orchestrator's own lifetime,
    /// stdout/stderr redirected to the given files. Returns the PID.
    fn spawn(&self, program: &str, args: &[String], stdout: File, stderr: File)
        -> io::Result<u32>;

    /// Whether a process with this PID currently exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// Ask the process to shut down (SIGTERM).
    fn terminate(&self, pid: u32) -> io::Result<()>;

    /// Force it (SIGKILL).
    fn kill(&self, pid: u32) -> io::Result<()>;
}

/// Unix implementation: `std::process` spawn plus signal-0 liveness probes.
pub struct UnixSupervisor;

impl ProcessSupervisor for UnixSupervisor {
    fn spawn(
        &self,
        program: &str,
        args: &[String],
        stdout: File,
        stderr: File,
    ) -> io::Result<u32> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()?;
        // Dropping the Child handle leaves the process running on its own.
        Ok(child.id())
    }

    fn is_alive(&self, pid: u32) -> bool {
        unsafe {
            // Reap the process first if it exited while still our child;
            // a zombie would otherwise keep answering signal 0.
            let mut status = 0;
            libc::waitpid(pid as i32, &mut status, libc::WNOHANG);
            libc::kill(pid as i32, 0) == 0
        }
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        send_signal(pid, libc::SIGTERM)
    }

    fn kill(&self, pid: u32) -> io::Result<()> {
        send_signal(pid, libc::SIGKILL)
    }
}

fn send_signal(pid: u32, signal: i32) -> io::Result<()> {
    let ret = unsafe { libc::kill(pid as i32, signal) };
    if ret == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    // A process that is already gone counts as delivered.
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}
