//! # Hookvisor Trigger
//!
//! Everything between an inbound webhook and the supervisor loop:
//!
//! - [`Verifier`] decides whether a delivery is authentic (HMAC-SHA256 over
//!   the raw body) and relevant (event type and ref).
//! - [`trigger_channel`] is the single-slot, coalescing "restart now" handoff.
//! - [`ShutdownSignal`] is the idempotent "stop, do not restart" broadcast.

pub mod channel;
pub mod payload;
pub mod verifier;

pub use channel::{trigger_channel, ShutdownSignal, TriggerOutcome, TriggerReceiver, TriggerSender};
pub use payload::PushEvent;
pub use verifier::{
    IgnoreReason, IncomingTrigger, Verdict, Verifier, VerifyError, WebhookSecret, EVENT_HEADER,
    SIGNATURE_HEADER,
};
