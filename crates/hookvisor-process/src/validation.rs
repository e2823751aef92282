//! Executable validation.
//!
//! Run once at startup and again before every spawn, so a binary that
//! disappears between restarts is reported as a configuration error rather
//! than an opaque spawn failure.

use hookvisor_common::{SupervisorError, SupervisorResult};
use std::path::{Path, PathBuf};

/// Validate that `command` names an executable file and return its location.
///
/// A command containing a path separator is checked as given (relative to
/// `working_dir` when one is set). A bare name is searched for in `PATH`,
/// the same lookup the OS performs at spawn time.
pub fn validate_executable(command: &str, working_dir: Option<&Path>) -> SupervisorResult<PathBuf> {
    if command.trim().is_empty() {
        return Err(SupervisorError::configuration(
            command,
            "Executable path cannot be empty",
        ));
    }

    let as_path = Path::new(command);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        let candidate = match working_dir {
            Some(dir) if as_path.is_relative() => dir.join(as_path),
            _ => as_path.to_path_buf(),
        };
        return if is_executable(&candidate) {
            Ok(candidate)
        } else {
            Err(SupervisorError::configuration(
                command,
                format!("'{}' is not an executable file", candidate.display()),
            ))
        };
    }

    let search_path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&search_path)
        .flat_map(|dir| executable_candidates(&dir, command))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| SupervisorError::configuration(command, "Executable not found in PATH"))
}

#[cfg(not(windows))]
fn executable_candidates(dir: &Path, command: &str) -> Vec<PathBuf> {
    vec![dir.join(command)]
}

#[cfg(windows)]
fn executable_candidates(dir: &Path, command: &str) -> Vec<PathBuf> {
    vec![dir.join(command), dir.join(format!("{command}.exe"))]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
