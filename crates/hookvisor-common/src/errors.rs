//! Error types for hookvisor.
//!
//! Every error here is built with `thiserror` and carries enough context
//! (command, stream, path, pid) to be logged on its own without the caller
//! having to re-attach anything.

use crate::types::StreamType;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for supervisor operations.
pub type SupervisorResult<T> = std::result::Result<T, SupervisorError>;

/// Faults that stop the whole supervisor.
///
/// There is no recovery path for any of these: a command that cannot be
/// launched or a sink that cannot be opened will fail the same way on every
/// restart, so the program exits instead of looping.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Process configuration error: {command} - {reason}")]
    Configuration { command: String, reason: String },

    #[error("Failed to open {stream} sink '{}': {source}", .path.display())]
    SinkOpen {
        stream: StreamType,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Process spawn failed: {command} - {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Process {stream} pipe was not captured: {command}")]
    MissingPipe { command: String, stream: StreamType },
}

impl SupervisorError {
    pub fn configuration(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn sink_open(stream: StreamType, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SinkOpen {
            stream,
            path: path.into(),
            source,
        }
    }

    pub fn spawn_failed(command: impl Into<String>, source: io::Error) -> Self {
        Self::SpawnFailed {
            command: command.into(),
            source,
        }
    }

    pub fn missing_pipe(command: impl Into<String>, stream: StreamType) -> Self {
        Self::MissingPipe {
            command: command.into(),
            stream,
        }
    }
}

/// An unexpected I/O fault while copying a child stream into its sink.
///
/// End-of-stream and a pipe closed by the supervisor are not errors; only a
/// genuine read or write failure produces this.
#[derive(Debug, Error)]
#[error("Output relay for {stream} failed after {copied} bytes: {source}")]
pub struct RelayError {
    pub stream: StreamType,
    pub copied: u64,
    #[source]
    pub source: io::Error,
}

impl RelayError {
    pub fn new(stream: StreamType, copied: u64, source: io::Error) -> Self {
        Self {
            stream,
            copied,
            source,
        }
    }
}

/// A signal could not be delivered to a live process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Failed to send {signal} to PID {pid}: {reason}")]
pub struct SignalError {
    pub pid: u32,
    pub signal: &'static str,
    pub reason: String,
}

impl SignalError {
    pub fn new(pid: u32, signal: &'static str, reason: impl Into<String>) -> Self {
        Self {
            pid,
            signal,
            reason: reason.into(),
        }
    }
}
