//! Process and port liveness checks against the operating system
//!
//! Unix asks `kill(pid, 0)`; Windows opens the process and reads its exit
//! code.

use std::net::{Ipv4Addr, TcpListener};

/// Answers liveness questions for the allocator and registry
///
/// Implementations must not block: each call is a single non-waiting
/// syscall or cheaper.
pub trait LivenessProbe: Send + Sync {
    /// Whether the process `pid` still exists
    ///
    /// Returns `false` only when the OS positively reports the process as
    /// gone. Ambiguous failures count as alive.
    fn process_alive(&self, pid: u32) -> bool;

    /// Whether `port` can be bound on loopback right now
    fn port_bindable(&self, port: u16) -> bool;
}

/// Probe backed by the real process table and network stack
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl LivenessProbe for SystemProbe {
    fn process_alive(&self, pid: u32) -> bool {
        process_alive(pid)
    }

    fn port_bindable(&self, port: u16) -> bool {
        port_bindable(port)
    }
}

/// Check whether a process exists
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        // Exists but belongs to another user
        Err(Errno::EPERM) => true,
        Err(errno) => {
            tracing::debug!(pid, %errno, "Ambiguous liveness result, treating process as alive");
            true
        }
    }
}

/// Check whether a process exists
///
/// `OpenProcess` failing with `ERROR_INVALID_PARAMETER` means no such pid.
/// An open handle with an exit code other than `STILL_ACTIVE` means the
/// process has exited. Every other failure counts as alive.
#[cfg(windows)]
pub fn process_alive(pid: u32) -> bool {
    use windows::core::HRESULT;
    use windows::Win32::Foundation::{CloseHandle, ERROR_INVALID_PARAMETER, STILL_ACTIVE};
    use windows::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
    };

    if pid == 0 {
        return false;
    }

    unsafe {
        match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(handle) => {
                let mut exit_code: u32 = 0;
                let alive = match GetExitCodeProcess(handle, &mut exit_code) {
                    Ok(()) => (exit_code as i32) == STILL_ACTIVE.0,
                    Err(e) => {
                        tracing::debug!(pid, error = %e, "Ambiguous liveness result, treating process as alive");
                        true
                    }
                };
                let _ = CloseHandle(handle);
                alive
            }
            Err(e) if e.code() == HRESULT::from_win32(ERROR_INVALID_PARAMETER.0) => false,
            Err(e) => {
                // Access denied and friends: the pid exists
                tracing::debug!(pid, error = %e, "Ambiguous liveness result, treating process as alive");
                true
            }
        }
    }
}

/// Check whether a process exists
///
/// Platforms without a process query treat every non-zero pid as alive.
#[cfg(not(any(unix, windows)))]
pub fn process_alive(pid: u32) -> bool {
    pid != 0
}

/// Try an exclusive loopback bind on `port` and release it immediately
pub fn port_bindable(port: u16) -> bool {
    if port == 0 {
        return false;
    }

    match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) => {
            tracing::trace!(port, error = %e, "Port not bindable");
            false
        }
    }
}
