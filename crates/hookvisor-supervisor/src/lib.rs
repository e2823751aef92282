//! # Hookvisor Supervisor
//!
//! The restart loop that owns the single managed child process, and the
//! configuration it runs from.

pub mod config;
pub mod managed;
pub mod supervisor;

pub use config::{parse_duration, ConfigOverrides, SecretString, SupervisorConfig};
pub use managed::{ManagedProcess, ProcessSpec, TerminationOutcome};
pub use supervisor::{Supervisor, SupervisorSummary};
