//! Process termination primitives.
//!
//! A process that is already gone is not an error here: both helpers report
//! [`SignalDelivery::ProcessGone`] instead, since the caller's goal (the
//! process not running) is already met.

use hookvisor_common::SignalError;

/// Outcome of a signal that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDelivery {
    /// The signal was delivered to a live process.
    Delivered,
    /// No such process (ESRCH): it exited before the signal was sent.
    ProcessGone,
}

/// Ask a process to terminate itself (SIGTERM).
#[cfg(unix)]
pub fn terminate_gracefully(pid: u32) -> Result<SignalDelivery, SignalError> {
    send_signal(pid, nix::sys::signal::Signal::SIGTERM)
}

/// Force kill a process (SIGKILL).
#[cfg(unix)]
pub fn force_kill(pid: u32) -> Result<SignalDelivery, SignalError> {
    send_signal(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<SignalDelivery, SignalError> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| SignalError::new(pid, signal.as_str(), "PID out of range"))?;
    if raw <= 0 {
        // kill(0) and negative PIDs address process groups.
        return Err(SignalError::new(pid, signal.as_str(), "Invalid PID"));
    }

    match kill(Pid::from_raw(raw), signal) {
        Ok(()) => {
            tracing::debug!(pid, signal = signal.as_str(), "Signal delivered");
            Ok(SignalDelivery::Delivered)
        }
        Err(Errno::ESRCH) => {
            tracing::debug!(pid, signal = signal.as_str(), "Process already gone");
            Ok(SignalDelivery::ProcessGone)
        }
        Err(e) => Err(SignalError::new(pid, signal.as_str(), e.to_string())),
    }
}

/// Graceful termination needs a console control event on Windows, which a
/// piped child without its own console cannot receive. Callers fall back to
/// killing the child handle directly.
#[cfg(not(unix))]
pub fn terminate_gracefully(pid: u32) -> Result<SignalDelivery, SignalError> {
    Err(SignalError::new(pid, "terminate", "graceful termination not supported on this platform"))
}

#[cfg(not(unix))]
pub fn force_kill(pid: u32) -> Result<SignalDelivery, SignalError> {
    Err(SignalError::new(pid, "kill", "PID based kill not supported on this platform"))
}
