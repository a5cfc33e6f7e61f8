//! Upstream broker subscription.
//!
//! [`BrokerConnector`] and [`BrokerLink`] are the seam between the consumer
//! state machine and the AMQP client: production wires in
//! [`AmqpConnector`], tests substitute fakes.

pub mod amqp;
pub mod backoff;
pub mod consumer;

use async_trait::async_trait;
use omni_settings::BrokerSettings;
use thiserror::Error;

pub use amqp::AmqpConnector;
pub use backoff::BackoffPolicy;
pub use consumer::{BrokerConsumer, SubscriptionState};

/// Broker transport failure. Always recovered by reconnecting.
#[derive(Debug, Error)]
pub enum TransportError {
    /// AMQP protocol or connection error.
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),
    /// Socket-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The broker closed the delivery stream.
    #[error("delivery stream closed by broker")]
    StreamClosed,
    /// A message was requested before `subscribe` succeeded.
    #[error("link is not subscribed")]
    NotSubscribed,
}

/// Exchange, queue and binding the relay subscribes with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Topic exchange name.
    pub exchange: String,
    /// Exclusive auto-delete queue name; empty for a broker-generated name.
    pub queue: String,
    /// Wildcard binding key.
    pub binding_key: String,
    /// Consumer tag.
    pub consumer_tag: String,
    /// QoS prefetch count.
    pub prefetch: u16,
}

impl From<&BrokerSettings> for Topology {
    fn from(s: &BrokerSettings) -> Self {
        Self {
            exchange: s.exchange.clone(),
            queue: s.queue.clone(),
            binding_key: s.binding_key.clone(),
            consumer_tag: s.consumer_tag.clone(),
            prefetch: s.prefetch,
        }
    }
}

/// One delivery pulled from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel-scoped tag used to acknowledge.
    pub delivery_tag: u64,
    /// Routing key the producer published with.
    pub routing_key: String,
    /// Raw `EventFrame` bytes.
    pub body: Vec<u8>,
    /// Whether the broker delivered this message before.
    pub redelivered: bool,
}

/// Opens links to the broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a connection and a channel.
    async fn connect(&self) -> Result<Box<dyn BrokerLink>, TransportError>;
}

/// An open connection+channel pair.
#[async_trait]
pub trait BrokerLink: Send {
    /// Declare the exchange and queue, bind them, and start consuming.
    /// Declarations are idempotent.
    async fn subscribe(&mut self, topology: &Topology) -> Result<(), TransportError>;

    /// Wait for the next delivery. `Ok(None)` means the stream ended cleanly.
    async fn next_message(&mut self) -> Result<Option<InboundMessage>, TransportError>;

    /// Acknowledge one delivery.
    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError>;

    /// Tear down channel and connection. Errors are ignored.
    async fn close(&mut self);
}
