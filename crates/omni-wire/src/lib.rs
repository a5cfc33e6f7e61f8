//! # omni-wire
//!
//! The `omni.EventFrame` protobuf schema and the two transforms the relay
//! applies to every broker message:
//!
//! - [`decode`]: raw bytes → [`EventFrame`] (or [`DecodeError`])
//! - [`to_interchange`]: [`EventFrame`] → [`InterchangeEvent`] (canonical
//!   protobuf JSON with original field names)

#![deny(unsafe_code)]

pub mod decode;
pub mod interchange;
pub mod schema;

pub use decode::{DecodeError, decode};
pub use interchange::{InterchangeEvent, to_interchange};
pub use schema::{
    AccountUpdate, EventFrame, GatewayState, GatewayStatus, MarketData, OrderUpdate,
    PositionUpdate, TradeUpdate, event_frame,
};
