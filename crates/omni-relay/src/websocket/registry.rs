//! Connection registry and event fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::{ClientConnection, DeliveryError};
use crate::metrics::{RELAY_DELIVERIES_TOTAL, RELAY_DELIVERY_FAILURES_TOTAL};

/// Outcome of one broadcast cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections offered the payload.
    pub attempted: usize,
    /// Payloads enqueued.
    pub delivered: usize,
    /// Payloads dropped on a full queue (connection kept).
    pub dropped: usize,
    /// Closed connections removed during this cycle.
    pub evicted: usize,
}

/// Tracks live client connections and fans payloads out to them.
///
/// One instance is owned by the server and shared by `Arc` with the
/// pipeline; there is no global registry.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection. Returns `false` if its ID is already registered,
    /// in which case the registry is unchanged.
    pub async fn register(&self, connection: Arc<ClientConnection>) -> bool {
        let mut conns = self.connections.write().await;
        if conns.contains_key(&connection.id) {
            debug!(conn_id = %connection.id, "connection already registered");
            return false;
        }
        let _ = conns.insert(connection.id.clone(), connection);
        true
    }

    /// Remove a connection by ID. Removing an absent ID is a no-op.
    pub async fn unregister(&self, connection_id: &str) -> bool {
        self.connections.write().await.remove(connection_id).is_some()
    }

    /// Deliver `payload` to every connection registered at call time.
    ///
    /// Works on a snapshot so concurrent register/unregister never blocks on
    /// delivery. Closed connections are unregistered; a full queue drops the
    /// payload for that client only. Never fails.
    pub async fn broadcast(&self, payload: Arc<str>) -> BroadcastReport {
        let snapshot: Vec<Arc<ClientConnection>> =
            self.connections.read().await.values().cloned().collect();

        let mut report = BroadcastReport::default();
        for conn in &snapshot {
            report.attempted += 1;
            match conn.send(Arc::clone(&payload)) {
                Ok(()) => {
                    report.delivered += 1;
                }
                Err(err @ DeliveryError::Full) => {
                    report.dropped += 1;
                    counter!(RELAY_DELIVERY_FAILURES_TOTAL, "reason" => err.reason()).increment(1);
                    warn!(conn_id = %conn.id, dropped = conn.drop_count(), "client queue full, message dropped");
                }
                Err(err @ DeliveryError::Closed) => {
                    counter!(RELAY_DELIVERY_FAILURES_TOTAL, "reason" => err.reason()).increment(1);
                    if self.unregister(&conn.id).await {
                        report.evicted += 1;
                    }
                    warn!(conn_id = %conn.id, "client connection closed, unregistered");
                }
            }
        }
        counter!(RELAY_DELIVERIES_TOTAL).increment(report.delivered as u64);
        report
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Whether `connection_id` is registered.
    pub async fn contains(&self, connection_id: &str) -> bool {
        self.connections.read().await.contains_key(connection_id)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
