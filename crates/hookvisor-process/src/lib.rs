//! # Hookvisor Process
//!
//! Low-level process operations used by the supervisor:
//! - Signal delivery (graceful termination, forced kill)
//! - Process existence checks
//! - Executable validation before spawning
//!
//! Signal helpers are PID based. Callers must only use them on a child they
//! have not reaped yet, otherwise the PID may already belong to someone else.

pub mod check;
pub mod terminate;
pub mod validation;

pub use check::process_exists;
pub use terminate::{force_kill, terminate_gracefully, SignalDelivery};
pub use validation::validate_executable;
