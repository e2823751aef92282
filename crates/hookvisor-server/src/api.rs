//! Webhook endpoint.
//!
//! Every method on every path lands in the same handler, and every request
//! the handler sees is answered `200 OK` with an empty body. Whether it
//! restarted anything only shows up in the logs.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    Router,
};
use hookvisor_trigger::{
    IncomingTrigger, TriggerOutcome, TriggerSender, Verdict, Verifier, VerifyError, EVENT_HEADER,
    SIGNATURE_HEADER,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Largest delivery GitHub sends.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared, read-only handler state.
#[derive(Debug)]
pub struct WebhookState {
    pub verifier: Verifier,
    pub triggers: TriggerSender,
}

/// Creates the webhook router.
pub fn create_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .fallback(handle_webhook)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let incoming = IncomingTrigger {
        event: header_str(&headers, EVENT_HEADER),
        signature: header_str(&headers, SIGNATURE_HEADER),
        body: &body,
    };

    match state.verifier.verify(&incoming) {
        Ok(Verdict::Trigger(push)) => match state.triggers.fire() {
            TriggerOutcome::Queued => info!(
                git_ref = %push.git_ref,
                commit = %push.short_commit(),
                pusher = %push.pusher_name(),
                "Restart queued"
            ),
            TriggerOutcome::Coalesced => {
                debug!(git_ref = %push.git_ref, "Restart already pending, trigger coalesced")
            }
            TriggerOutcome::Closed => info!("Supervisor shutting down, trigger dropped"),
        },
        Ok(Verdict::Ignored(reason)) => debug!(%reason, "Webhook ignored"),
        Err(e @ VerifyError::MalformedPayload(_)) => error!(error = %e, "Webhook rejected"),
        Err(e) => warn!(error = %e, "Webhook rejected"),
    }

    StatusCode::OK
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
