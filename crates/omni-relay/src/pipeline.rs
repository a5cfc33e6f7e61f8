//! Decode → project → fan-out for one broker message.

use std::sync::Arc;

use metrics::counter;
use omni_wire::event_frame::Payload;
use omni_wire::{DecodeError, EventFrame, decode, to_interchange};
use tracing::{debug, trace, warn};

use crate::metrics::{
    RELAY_BROADCASTS_TOTAL, RELAY_DECODE_ERRORS_TOTAL, RELAY_MESSAGES_DECODED_TOTAL,
    RELAY_MESSAGES_RECEIVED_TOTAL,
};
use crate::websocket::registry::{BroadcastReport, ConnectionRegistry};

/// Result of processing one message body.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The frame was decoded and offered to every live connection.
    Broadcast(BroadcastReport),
    /// The body could not be decoded and was discarded.
    Discarded(DecodeError),
}

impl ProcessOutcome {
    /// Whether the message reached the fan-out stage.
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast(_))
    }
}

/// Drives raw message bodies through the decoder and the registry.
#[derive(Clone)]
pub struct RelayPipeline {
    registry: Arc<ConnectionRegistry>,
}

impl RelayPipeline {
    /// Create a pipeline that broadcasts into `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this pipeline broadcasts into.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Process one message body. Never fails: undecodable bodies are
    /// logged and reported as [`ProcessOutcome::Discarded`].
    pub async fn process(&self, body: &[u8]) -> ProcessOutcome {
        counter!(RELAY_MESSAGES_RECEIVED_TOTAL).increment(1);

        let frame = match decode(body) {
            Ok(frame) => frame,
            Err(e) => {
                counter!(RELAY_DECODE_ERRORS_TOTAL).increment(1);
                warn!(error = %e, len = body.len(), "discarding undecodable message");
                return ProcessOutcome::Discarded(e);
            }
        };

        let kind = frame.kind().unwrap_or("unknown");
        counter!(RELAY_MESSAGES_DECODED_TOTAL, "kind" => kind).increment(1);
        log_summary(&frame);

        let payload: Arc<str> = Arc::from(to_interchange(&frame).into_value().to_string());
        let report = self.registry.broadcast(payload).await;
        counter!(RELAY_BROADCASTS_TOTAL).increment(1);
        debug!(
            kind,
            source_id = %frame.source_id,
            attempted = report.attempted,
            delivered = report.delivered,
            dropped = report.dropped,
            evicted = report.evicted,
            "event broadcast"
        );
        ProcessOutcome::Broadcast(report)
    }
}

/// Summarize business events as they pass. Ticks are high-volume and stay at
/// `trace`.
fn log_summary(frame: &EventFrame) {
    let source_id = frame.source_id.as_str();
    match &frame.payload {
        Some(Payload::Tick(t)) => {
            trace!(source_id, symbol = %t.symbol, last_price = t.last_price, volume = t.volume, "tick");
        }
        Some(Payload::Account(a)) => {
            debug!(source_id, account_id = %a.account_id, balance = a.balance, available = a.available, "account update");
        }
        Some(Payload::Position(p)) => {
            debug!(source_id, symbol = %p.symbol, direction = %p.direction, volume = p.volume, "position update");
        }
        Some(Payload::Order(o)) => {
            debug!(source_id, symbol = %o.symbol, status = %o.status, price = o.price, volume = o.volume, "order update");
        }
        Some(Payload::Trade(t)) => {
            debug!(source_id, symbol = %t.symbol, price = t.price, volume = t.volume, "trade update");
        }
        Some(Payload::Status(s)) => {
            debug!(source_id, gateway_id = %s.gateway_id, state = ?s.state(), message = %s.message, "gateway status");
        }
        None => {}
    }
}
