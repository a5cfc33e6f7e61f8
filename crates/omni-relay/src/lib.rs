//! # omni-relay
//!
//! Consumes `EventFrame`s from the broker and fans them out to WebSocket
//! clients as JSON.
//!
//! - [`broker`]: subscription state machine with reconnect backoff
//! - [`pipeline`]: decode → interchange JSON → broadcast
//! - [`websocket`]: connection registry, sessions, heartbeat
//! - [`server`]: Axum routes (`/`, `/health`, `/ws`, `/metrics`)
//! - [`shutdown`]: two-stage shutdown, consumer before server

#![deny(unsafe_code)]

pub mod broker;
pub mod config;
pub mod health;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use broker::{AmqpConnector, BackoffPolicy, BrokerConsumer, Topology, TransportError};
pub use config::ServerConfig;
pub use pipeline::{ProcessOutcome, RelayPipeline};
pub use server::RelayServer;
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use websocket::connection::DeliveryError;
pub use websocket::registry::{BroadcastReport, ConnectionRegistry};
