//! # Hookvisor Common
//!
//! Error and stream types shared by every crate in the hookvisor workspace.
//!
//! Errors are split by who may observe them:
//! - [`SupervisorError`] ends the supervisor loop (startup and configuration faults).
//! - [`RelayError`] ends one output relay and, through it, one restart cycle.
//! - [`SignalError`] is produced by the process primitives when a signal
//!   cannot be delivered for a reason other than the process being gone.

pub mod errors;
pub mod types;

pub use errors::{RelayError, SignalError, SupervisorError, SupervisorResult};
pub use types::StreamType;
