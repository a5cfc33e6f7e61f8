//! Broker consumer state machine.
//!
//! `Disconnected → Connecting → Subscribed → Consuming`, and back to
//! `Disconnected` on any transport error. The loop retries forever with the
//! configured backoff until its cancellation token fires.

use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::backoff::BackoffPolicy;
use super::{BrokerConnector, BrokerLink, Topology, TransportError};
use crate::metrics::{RELAY_BROKER_CONNECTED, RELAY_BROKER_RECONNECTS_TOTAL};
use crate::pipeline::{ProcessOutcome, RelayPipeline};

/// The consumer's view of its broker link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No link. Initial state, and the state after any failure.
    Disconnected,
    /// Opening connection and channel.
    Connecting,
    /// Exchange, queue and binding declared.
    Subscribed,
    /// Pulling messages.
    Consuming,
}

/// Consumes the subscription queue and feeds the pipeline.
pub struct BrokerConsumer {
    connector: Arc<dyn BrokerConnector>,
    topology: Topology,
    backoff: BackoffPolicy,
    pipeline: RelayPipeline,
    state: SubscriptionState,
    attempt: u32,
}

impl BrokerConsumer {
    /// Create a consumer in the `Disconnected` state.
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        topology: Topology,
        backoff: BackoffPolicy,
        pipeline: RelayPipeline,
    ) -> Self {
        Self {
            connector,
            topology,
            backoff,
            pipeline,
            state: SubscriptionState::Disconnected,
            attempt: 0,
        }
    }

    /// Launch the consumer as a background task.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run_until(cancel))
    }

    /// Run until `cancel` fires. Transport errors never end the loop.
    #[instrument(skip_all, name = "broker_consumer", fields(exchange = %self.topology.exchange))]
    pub async fn run_until(mut self, cancel: CancellationToken) {
        loop {
            match self.connect_and_consume(&cancel).await {
                Ok(()) => break,
                Err(e) => warn!(error = %e, state = ?self.state, "broker link failed"),
            }
            self.transition(SubscriptionState::Disconnected);

            let delay = self.backoff.delay(self.attempt);
            self.attempt = self.attempt.saturating_add(1);
            counter!(RELAY_BROKER_RECONNECTS_TOTAL).increment(1);
            info!(
                attempt = self.attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnecting after backoff"
            );
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => break,
            }
        }
        self.transition(SubscriptionState::Disconnected);
        info!("broker consumer stopped");
    }

    /// One pass through the state machine. `Ok(())` means cancelled.
    async fn connect_and_consume(&mut self, cancel: &CancellationToken) -> Result<(), TransportError> {
        self.transition(SubscriptionState::Connecting);
        let mut link = tokio::select! {
            link = self.connector.connect() => link?,
            () = cancel.cancelled() => return Ok(()),
        };

        let result = self.consume(link.as_mut(), cancel).await;
        link.close().await;
        result
    }

    async fn consume(
        &mut self,
        link: &mut dyn BrokerLink,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        tokio::select! {
            subscribed = link.subscribe(&self.topology) => subscribed?,
            () = cancel.cancelled() => return Ok(()),
        }
        self.transition(SubscriptionState::Subscribed);
        self.transition(SubscriptionState::Consuming);
        self.attempt = 0;

        loop {
            let next = tokio::select! {
                next = link.next_message() => next?,
                () = cancel.cancelled() => return Ok(()),
            };
            let Some(message) = next else {
                return Err(TransportError::StreamClosed);
            };

            if message.redelivered {
                info!(
                    delivery_tag = message.delivery_tag,
                    routing_key = %message.routing_key,
                    "processing redelivered message"
                );
            }

            // Acknowledge only after the cycle completes, including discards.
            let outcome = self.pipeline.process(&message.body).await;
            if let ProcessOutcome::Discarded(e) = &outcome {
                debug!(delivery_tag = message.delivery_tag, error = %e, "acknowledging discarded message");
            }
            link.ack(message.delivery_tag).await?;
        }
    }

    fn transition(&mut self, next: SubscriptionState) {
        if self.state == next {
            return;
        }
        debug!(from = ?self.state, to = ?next, "subscription state");
        gauge!(RELAY_BROKER_CONNECTED).set(if next == SubscriptionState::Consuming { 1.0 } else { 0.0 });
        self.state = next;
    }
}
