//! Webhook HTTP server.

use crate::api::{create_router, WebhookState};
use axum::Router;
use hookvisor_trigger::{ShutdownSignal, TriggerSender, Verifier};
use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct WebhookServer {
    listener: TcpListener,
    router: Router,
}

impl WebhookServer {
    /// Bind `address` (`host:port`, resolved) and build the router.
    pub async fn bind(address: &str, verifier: Verifier, triggers: TriggerSender) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let router = create_router(Arc::new(WebhookState { verifier, triggers }));
        Ok(Self { listener, router })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` closes, then give in-flight requests up to
    /// `drain_timeout` before abandoning them.
    pub async fn run(self, shutdown: ShutdownSignal, drain_timeout: Duration) -> io::Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, "Webhook server listening");

        let serve = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown.wait_owned())
            .into_future();
        let mut serve = std::pin::pin!(serve);

        tokio::select! {
            result = &mut serve => return result,
            _ = shutdown.wait() => {}
        }

        match tokio::time::timeout(drain_timeout, serve).await {
            Ok(result) => {
                info!(%addr, "Webhook server stopped");
                result
            }
            Err(_) => {
                warn!(
                    %addr,
                    timeout = ?drain_timeout,
                    "In-flight requests still running, abandoning them"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookvisor_trigger::{trigger_channel, WebhookSecret};

    fn verifier() -> Verifier {
        Verifier::new(WebhookSecret::new("s").unwrap(), "push", "refs/heads/main")
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let (triggers, _receiver) = trigger_channel();
        let server = WebhookServer::bind("127.0.0.1:0", verifier(), triggers)
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);

        let shutdown = ShutdownSignal::new();
        let task = tokio::spawn(server.run(shutdown.clone(), Duration::from_secs(1)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.shutdown();

        tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .expect("server stops")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_reported() {
        let (triggers, _receiver) = trigger_channel();
        let first = WebhookServer::bind("127.0.0.1:0", verifier(), triggers.clone())
            .await
            .unwrap();
        let taken = first.local_addr().unwrap().to_string();

        assert!(WebhookServer::bind(&taken, verifier(), triggers).await.is_err());
    }
}
