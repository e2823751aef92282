//! # Hookvisor Server
//!
//! axum front door that verifies webhook deliveries and forwards restart
//! triggers to the supervisor.

pub mod api;
pub mod server;

pub use api::{create_router, WebhookState};
pub use server::WebhookServer;
