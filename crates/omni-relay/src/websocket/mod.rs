//! WebSocket connection management, heartbeat and fan-out.

pub mod connection;
pub mod heartbeat;
pub mod registry;
pub mod session;
