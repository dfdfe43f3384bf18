//! Ask a process to exit by PID.

use std::io;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Send SIGTERM to `pid`.
///
/// Returns `Ok(false)` if the process was already gone. Workers release
/// their lease on SIGTERM, so this is the graceful path; callers wait a
/// settle delay afterwards rather than escalating.
#[cfg(unix)]
pub fn terminate_pid(pid: u32) -> io::Result<bool> {
    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

/// Terminate `pid`. There is no SIGTERM here; the process is killed.
#[cfg(not(unix))]
pub fn terminate_pid(pid: u32) -> io::Result<bool> {
    let sys = sysinfo::System::new_all();
    match sys.process(sysinfo::Pid::from_u32(pid)) {
        Some(process) => Ok(process.kill()),
        None => Ok(false),
    }
}

/// Whether `pid` exists, using the null signal.
#[cfg(unix)]
pub fn pid_exists(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        // Exists but belongs to someone else.
        Err(_) => true,
    }
}

#[cfg(not(unix))]
pub fn pid_exists(pid: u32) -> bool {
    sysinfo::System::new_all()
        .process(sysinfo::Pid::from_u32(pid))
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn own_pid_exists() {
        assert!(pid_exists(std::process::id()));
    }

    #[test]
    #[cfg(unix)]
    fn impossible_pid_does_not_exist() {
        assert!(!pid_exists(999_999_999));
        assert!(!terminate_pid(999_999_999).unwrap());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn terminates_a_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        assert!(terminate_pid(pid).unwrap());
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }
}
