//! # Hookvisor Output
//!
//! Captures the managed child's stdout and stderr.
//!
//! - [`open_sink`] opens an append-only destination file (never truncated, so
//!   output from earlier restart cycles is kept).
//! - [`OutputRelay`] copies one pipe into one sink on its own task until the
//!   pipe reaches end-of-stream or the supervisor closes it.

pub mod relay;
pub mod sink;

pub use relay::{OutputRelay, RelayReport, DEFAULT_DRAIN_TIMEOUT};
pub use sink::open_sink;
