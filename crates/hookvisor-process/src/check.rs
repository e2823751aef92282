//! Process existence checking.

/// Check whether a process with the given PID exists.
///
/// On Unix this is `kill(pid, 0)`: no signal is sent, but the kernel reports
/// whether the PID is live. `EPERM` means it exists and belongs to someone
/// else. A zombie still counts as existing until it is reaped.
#[cfg(unix)]
pub fn process_exists(pid: u32) -> bool {
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
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn process_exists(pid: u32) -> bool {
    pid == std::process::id()
}
