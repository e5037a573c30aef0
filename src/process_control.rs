//! One-shot process termination.

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TerminateError {
    #[error("no such process")]
    NoSuchProcess { pid: u32 },

    #[error("permission denied")]
    PermissionDenied { pid: u32 },

    #[error("invalid pid {pid}")]
    InvalidPid { pid: u32 },

    #[error("refusing to terminate own process (pid {pid})")]
    Refused { pid: u32 },

    #[error("termination of pid {pid} failed: {detail}")]
    Os { pid: u32, detail: String },
}

/// Zero, anything past `i32::MAX` (which `kill(2)` would read as a process
/// group) and our own pid are rejected before any signal is sent.
fn check_target(pid: u32) -> Result<i32, TerminateError> {
    let raw = i32::try_from(pid).map_err(|_| TerminateError::InvalidPid { pid })?;
    if raw <= 0 {
        return Err(TerminateError::InvalidPid { pid });
    }
    if pid == std::process::id() {
        return Err(TerminateError::Refused { pid });
    }
    Ok(raw)
}

/// Ask the OS to terminate `pid`. Returns once the request is accepted; the
/// process may still be running. No retries.
#[cfg(unix)]
pub fn terminate(pid: u32) -> Result<(), TerminateError> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = check_target(pid)?;
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => {
            info!(pid, "termination requested");
            Ok(())
        }
        Err(Errno::ESRCH) => Err(TerminateError::NoSuchProcess { pid }),
        Err(Errno::EPERM) => Err(TerminateError::PermissionDenied { pid }),
        Err(errno) => Err(TerminateError::Os {
            pid,
            detail: errno.to_string(),
        }),
    }
}

#[cfg(not(unix))]
pub fn terminate(pid: u32) -> Result<(), TerminateError> {
    use sysinfo::{Pid, ProcessesToUpdate, System};

    check_target(pid)?;
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    let process = sys
        .process(target)
        .ok_or(TerminateError::NoSuchProcess { pid })?;
    if process.kill() {
        info!(pid, "termination requested");
        Ok(())
    } else {
        Err(TerminateError::Os {
            pid,
            detail: "the OS rejected the termination request".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_process_reports_no_such_process() {
        let err = terminate(99999).unwrap_err();
        assert_eq!(err, TerminateError::NoSuchProcess { pid: 99999 });
        assert_eq!(err.to_string(), "no such process");
    }

    #[test]
    fn zero_and_oversized_pids_are_invalid() {
        assert_eq!(terminate(0), Err(TerminateError::InvalidPid { pid: 0 }));
        let huge = u32::MAX;
        assert_eq!(terminate(huge), Err(TerminateError::InvalidPid { pid: huge }));
    }

    #[test]
    fn own_process_is_refused() {
        let me = std::process::id();
        assert_eq!(terminate(me), Err(TerminateError::Refused { pid: me }));
    }

    #[cfg(unix)]
    #[test]
    fn child_process_accepts_termination() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        assert_eq!(terminate(child.id()), Ok(()));
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
