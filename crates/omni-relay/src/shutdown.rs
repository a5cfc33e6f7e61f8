//! Two-stage relay shutdown.
//!
//! Ingest stops first: the broker consumer finishes (and acks) the message
//! it is processing while clients are still connected to receive it. Only
//! then are the HTTP server and the client sessions cancelled.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default per-stage drain timeout.
const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// How each stage of a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The consumer stopped on its own before the timeout.
    pub consumer_drained: bool,
    /// The server stopped on its own before the timeout.
    pub server_drained: bool,
}

/// Owns the cancellation tokens for ingest (broker consumer) and delivery
/// (HTTP server, client sessions).
///
/// The ingest token is a child of the delivery token, so [`shutdown`]
/// stops everything at once; [`graceful_shutdown`] stops them in order.
///
/// [`shutdown`]: ShutdownCoordinator::shutdown
/// [`graceful_shutdown`]: ShutdownCoordinator::graceful_shutdown
pub struct ShutdownCoordinator {
    delivery: CancellationToken,
    ingest: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with neither stage cancelled.
    pub fn new() -> Self {
        let delivery = CancellationToken::new();
        let ingest = delivery.child_token();
        Self { delivery, ingest }
    }

    /// Token for the HTTP server and client sessions.
    pub fn token(&self) -> CancellationToken {
        self.delivery.clone()
    }

    /// Token for the broker consumer.
    pub fn ingest_token(&self) -> CancellationToken {
        self.ingest.clone()
    }

    /// Cancel both stages immediately.
    pub fn shutdown(&self) {
        self.delivery.cancel();
    }

    /// Whether any stage has been cancelled. New clients are refused from
    /// the moment ingest stops.
    pub fn is_shutting_down(&self) -> bool {
        self.ingest.is_cancelled()
    }

    /// Stop the consumer, wait for it, then stop and wait for the server.
    ///
    /// Each stage gets `timeout` (10 s by default); a task still running
    /// after its stage times out is aborted.
    pub async fn graceful_shutdown(
        &self,
        consumer: JoinHandle<()>,
        server: JoinHandle<()>,
        timeout: Option<Duration>,
    ) -> ShutdownReport {
        let timeout = timeout.unwrap_or(DEFAULT_STAGE_TIMEOUT);

        info!(timeout_secs = timeout.as_secs(), "stopping broker consumer");
        self.ingest.cancel();
        let consumer_drained = drain("broker consumer", consumer, timeout).await;

        info!("stopping server and client sessions");
        self.delivery.cancel();
        let server_drained = drain("server", server, timeout).await;

        ShutdownReport {
            consumer_drained,
            server_drained,
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

async fn drain(stage: &str, mut handle: JoinHandle<()>, timeout: Duration) -> bool {
    if tokio::time::timeout(timeout, &mut handle).await.is_ok() {
        true
    } else {
        warn!(stage, ?timeout, "stage timed out, aborting");
        handle.abort();
        false
    }
}
