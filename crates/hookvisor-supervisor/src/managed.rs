//! One running instance of the managed command.

use hookvisor_common::{RelayError, StreamType, SupervisorError, SupervisorResult};
use hookvisor_output::{open_sink, OutputRelay, RelayReport};
use hookvisor_process::{validate_executable, SignalDelivery};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Upper bound on waiting for the reap after SIGKILL.
const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(3);

/// What to run and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub command: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
}

/// How a termination request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The child was already gone; no signal was sent.
    AlreadyExited(Option<ExitStatus>),
    /// The child exited within the grace period.
    Graceful(ExitStatus),
    /// The grace period ran out and the child was killed.
    Forced(Option<ExitStatus>),
}

#[derive(Debug)]
pub struct ManagedProcess {
    command: String,
    child: Child,
    pid: Option<u32>,
    exit_status: Option<ExitStatus>,
    relays: Vec<OutputRelay>,
}

impl ManagedProcess {
    /// Open both sinks, spawn the child and start relaying its output.
    ///
    /// Relay faults are sent on `faults`.
    pub fn start(
        spec: &ProcessSpec,
        faults: &mpsc::UnboundedSender<RelayError>,
    ) -> SupervisorResult<Self> {
        let stdout_sink = open_sink(StreamType::Stdout, &spec.stdout_path)?;
        let stderr_sink = open_sink(StreamType::Stderr, &spec.stderr_path)?;

        let executable = validate_executable(&spec.command, spec.working_directory.as_deref())?;
        // Relative programs combined with current_dir resolve differently per platform.
        let executable = std::path::absolute(&executable).unwrap_or(executable);

        let mut cmd = Command::new(&executable);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_directory {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| SupervisorError::spawn_failed(&spec.command, e))?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::missing_pipe(&spec.command, StreamType::Stdout))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SupervisorError::missing_pipe(&spec.command, StreamType::Stderr))?;

        let relays = vec![
            OutputRelay::spawn(StreamType::Stdout, stdout, stdout_sink, faults.clone()),
            OutputRelay::spawn(StreamType::Stderr, stderr, stderr_sink, faults.clone()),
        ];

        info!(
            command = %spec.command,
            args = ?spec.args,
            pid = ?pid,
            "Process started"
        );

        Ok(Self {
            command: spec.command.clone(),
            child,
            pid,
            exit_status: None,
            relays,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Resolve when the child exits. Cancel-safe; once the child has been
    /// reaped this never resolves, so it can sit in a `select!` loop.
    pub async fn exited(&mut self) -> ExitStatus {
        if self.exit_status.is_some() {
            return std::future::pending().await;
        }
        match self.child.wait().await {
            Ok(status) => {
                self.exit_status = Some(status);
                status
            }
            Err(e) => {
                warn!(command = %self.command, error = %e, "Failed to wait for process");
                std::future::pending().await
            }
        }
    }

    /// Ask the child to stop, then kill it if it is still running after
    /// `grace`.
    pub async fn terminate(&mut self, grace: Duration) -> TerminationOutcome {
        if let Some(status) = self.exit_status {
            debug!(command = %self.command, %status, "Process already exited, nothing to signal");
            return TerminationOutcome::AlreadyExited(Some(status));
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                debug!(command = %self.command, %status, "Process already exited, nothing to signal");
                return TerminationOutcome::AlreadyExited(Some(status));
            }
            Ok(None) => {}
            Err(e) => {
                debug!(command = %self.command, error = %e, "Could not poll process status");
            }
        }

        let Some(pid) = self.pid else {
            return TerminationOutcome::AlreadyExited(None);
        };

        info!(command = %self.command, pid, "Sending termination signal");
        match hookvisor_process::terminate_gracefully(pid) {
            Ok(SignalDelivery::Delivered) => {}
            Ok(SignalDelivery::ProcessGone) => {
                debug!(pid, "Process gone before SIGTERM");
            }
            Err(e) => {
                // No graceful signal on this platform (or it failed): straight to kill.
                debug!(pid, error = %e, "Graceful signal unavailable");
                return self.force_kill(pid).await;
            }
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.exit_status = Some(status);
                info!(command = %self.command, pid, %status, "Process stopped gracefully");
                TerminationOutcome::Graceful(status)
            }
            Ok(Err(e)) => {
                warn!(command = %self.command, pid, error = %e, "Failed to wait for process");
                self.force_kill(pid).await
            }
            Err(_) => {
                warn!(
                    command = %self.command,
                    pid,
                    timeout = ?grace,
                    "Process did not exit within grace period, killing"
                );
                self.force_kill(pid).await
            }
        }
    }

    async fn force_kill(&mut self, pid: u32) -> TerminationOutcome {
        match hookvisor_process::force_kill(pid) {
            Ok(SignalDelivery::Delivered) => {}
            Ok(SignalDelivery::ProcessGone) => {
                debug!(pid, "Process gone before SIGKILL");
            }
            Err(_) => {
                if let Err(e) = self.child.start_kill() {
                    debug!(pid, error = %e, "Kill via child handle failed");
                }
            }
        }

        let status = match tokio::time::timeout(FORCE_KILL_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.exit_status = Some(status);
                Some(status)
            }
            Ok(Err(e)) => {
                warn!(pid, error = %e, "Failed to reap killed process");
                None
            }
            Err(_) => {
                warn!(pid, timeout = ?FORCE_KILL_TIMEOUT, "Killed process not reaped in time");
                None
            }
        };

        warn!(command = %self.command, pid, "Process forcefully terminated");
        TerminationOutcome::Forced(status)
    }

    /// Wait for both relays to drain, then release everything.
    pub async fn finish(self, drain_timeout: Duration) -> Vec<RelayReport> {
        let mut reports = Vec::with_capacity(self.relays.len());
        for relay in self.relays {
            reports.push(relay.join(drain_timeout).await);
        }
        debug!(command = %self.command, ?reports, "Process resources released");
        reports
    }
}
