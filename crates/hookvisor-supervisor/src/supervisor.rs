//! The restart loop.
//!
//! Each cycle starts one child, waits for a reason to stop it, terminates it
//! (graceful first, forced after the grace period) and releases its output
//! relays. Only a shutdown, or every trigger sender going away, ends the
//! loop; a failure to start the child ends it with an error.

use crate::config::SupervisorConfig;
use crate::managed::{ManagedProcess, ProcessSpec, TerminationOutcome};
use hookvisor_common::{RelayError, SupervisorResult};
use hookvisor_output::DEFAULT_DRAIN_TIMEOUT;
use hookvisor_trigger::{ShutdownSignal, TriggerReceiver};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorSummary {
    pub starts: u64,
    pub graceful_stops: u64,
    pub forced_kills: u64,
    pub relay_faults: u64,
    /// Children that exited without being asked to.
    pub unexpected_exits: u64,
}

#[derive(Debug)]
enum StopCause {
    Trigger,
    Shutdown,
    SendersGone,
    RelayFault(RelayError),
}

impl StopCause {
    fn ends_loop(&self) -> bool {
        matches!(self, StopCause::Shutdown | StopCause::SendersGone)
    }
}

pub struct Supervisor {
    spec: ProcessSpec,
    grace_timeout: Duration,
    drain_timeout: Duration,
    triggers: TriggerReceiver,
    shutdown: ShutdownSignal,
}

impl Supervisor {
    pub fn new(
        spec: ProcessSpec,
        grace_timeout: Duration,
        triggers: TriggerReceiver,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            spec,
            grace_timeout,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            triggers,
            shutdown,
        }
    }

    pub fn from_config(
        config: &SupervisorConfig,
        triggers: TriggerReceiver,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self::new(config.process_spec(), config.shutdown_timeout, triggers, shutdown)
    }

    /// How long relays may keep draining once their child is gone.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Run until shutdown. Returns an error only when a child cannot be
    /// started; the trigger channel is closed either way.
    pub async fn run(mut self) -> SupervisorResult<SupervisorSummary> {
        let mut summary = SupervisorSummary::default();
        let result = self.run_cycles(&mut summary).await;
        self.triggers.close();

        match &result {
            Ok(()) => info!(?summary, "Supervisor stopped"),
            Err(e) => warn!(error = %e, ?summary, "Supervisor stopped on startup failure"),
        }
        result.map(|()| summary)
    }

    async fn run_cycles(&mut self, summary: &mut SupervisorSummary) -> SupervisorResult<()> {
        loop {
            if self.shutdown.is_shutdown() {
                debug!("Shutdown requested, not starting a new process");
                return Ok(());
            }

            let (fault_tx, mut fault_rx) = mpsc::unbounded_channel();
            let mut process = ManagedProcess::start(&self.spec, &fault_tx)?;
            // Relays hold the remaining senders.
            drop(fault_tx);
            summary.starts += 1;

            let cause = self.wait_for_stop(&mut process, &mut fault_rx, summary).await;
            match &cause {
                StopCause::Trigger => info!(pid = ?process.pid(), "Restart triggered"),
                StopCause::Shutdown => info!(pid = ?process.pid(), "Stopping process for shutdown"),
                StopCause::SendersGone => {
                    info!(pid = ?process.pid(), "Trigger channel closed, stopping process")
                }
                StopCause::RelayFault(e) => {
                    summary.relay_faults += 1;
                    warn!(pid = ?process.pid(), error = %e, "Output relay failed, restarting process");
                }
            }

            match process.terminate(self.grace_timeout).await {
                TerminationOutcome::Graceful(_) => summary.graceful_stops += 1,
                TerminationOutcome::Forced(_) => summary.forced_kills += 1,
                TerminationOutcome::AlreadyExited(_) => {}
            }
            process.finish(self.drain_timeout).await;

            if cause.ends_loop() {
                return Ok(());
            }
        }
    }

    async fn wait_for_stop(
        &mut self,
        process: &mut ManagedProcess,
        faults: &mut mpsc::UnboundedReceiver<RelayError>,
        summary: &mut SupervisorSummary,
    ) -> StopCause {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.wait() => return StopCause::Shutdown,

                received = self.triggers.recv() => {
                    return if received {
                        StopCause::Trigger
                    } else {
                        StopCause::SendersGone
                    };
                }

                Some(fault) = faults.recv() => return StopCause::RelayFault(fault),

                status = process.exited() => {
                    summary.unexpected_exits += 1;
                    if status.success() {
                        info!(pid = ?process.pid(), %status, "Process exited, waiting for next trigger");
                    } else {
                        warn!(pid = ?process.pid(), %status, "Process exited, waiting for next trigger");
                    }
                }
            }
        }
    }
}
