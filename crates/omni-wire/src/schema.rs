//! `omni.EventFrame` and its payload messages.
//!
//! Hand-written `prost` derives mirroring the shared `omni.proto` used by the
//! gateways and the core router. Field numbers must stay in sync with the
//! producers.

use prost::{Enumeration, Message};

/// Envelope for every event published on the `omni.topic` exchange.
#[derive(Clone, PartialEq, Message)]
pub struct EventFrame {
    /// Producer wall-clock time in nanoseconds since the Unix epoch.
    #[prost(int64, tag = "1")]
    pub timestamp_ns: i64,
    /// Identifier of the producing gateway or account.
    #[prost(string, tag = "2")]
    pub source_id: String,
    /// The event body.
    #[prost(oneof = "event_frame::Payload", tags = "10, 11, 12, 13, 14, 15")]
    pub payload: Option<event_frame::Payload>,
}

/// Nested types for [`EventFrame`].
pub mod event_frame {
    use prost::Oneof;

    /// The event body carried by a frame.
    #[derive(Clone, PartialEq, Oneof)]
    pub enum Payload {
        /// Market data snapshot.
        #[prost(message, tag = "10")]
        Tick(super::MarketData),
        /// Order state change.
        #[prost(message, tag = "11")]
        Order(super::OrderUpdate),
        /// Fill report.
        #[prost(message, tag = "12")]
        Trade(super::TradeUpdate),
        /// Account funds snapshot.
        #[prost(message, tag = "13")]
        Account(super::AccountUpdate),
        /// Position snapshot.
        #[prost(message, tag = "14")]
        Position(super::PositionUpdate),
        /// Gateway connectivity change.
        #[prost(message, tag = "15")]
        Status(super::GatewayStatus),
    }
}

impl EventFrame {
    /// Proto field name of the populated payload, if any.
    pub fn kind(&self) -> Option<&'static str> {
        use event_frame::Payload;
        self.payload.as_ref().map(|p| match p {
            Payload::Tick(_) => "tick",
            Payload::Order(_) => "order",
            Payload::Trade(_) => "trade",
            Payload::Account(_) => "account",
            Payload::Position(_) => "position",
            Payload::Status(_) => "status",
        })
    }
}

/// Level-1 market data.
#[derive(Clone, PartialEq, Message)]
pub struct MarketData {
    /// Instrument symbol.
    #[prost(string, tag = "1")]
    pub symbol: String,
    /// Exchange code.
    #[prost(string, tag = "2")]
    pub exchange: String,
    /// Last traded price.
    #[prost(double, tag = "3")]
    pub last_price: f64,
    /// Cumulative traded volume.
    #[prost(int32, tag = "4")]
    pub volume: i32,
    /// Open interest.
    #[prost(double, tag = "5")]
    pub open_interest: f64,
}

/// Order report.
#[derive(Clone, PartialEq, Message)]
pub struct OrderUpdate {
    /// Exchange order id, or `ref:<front>-<session>-<ref>` before queueing.
    #[prost(string, tag = "1")]
    pub order_id: String,
    /// Instrument symbol.
    #[prost(string, tag = "2")]
    pub symbol: String,
    /// `Buy` / `Sell`.
    #[prost(string, tag = "3")]
    pub direction: String,
    /// Offset flag as reported by the venue.
    #[prost(string, tag = "4")]
    pub offset: String,
    /// Limit price.
    #[prost(double, tag = "5")]
    pub price: f64,
    /// Original order volume.
    #[prost(int32, tag = "6")]
    pub volume: i32,
    /// Venue status code.
    #[prost(string, tag = "7")]
    pub status: String,
}

/// Fill report.
#[derive(Clone, PartialEq, Message)]
pub struct TradeUpdate {
    /// Venue trade id.
    #[prost(string, tag = "1")]
    pub trade_id: String,
    /// Instrument symbol.
    #[prost(string, tag = "2")]
    pub symbol: String,
    /// `Buy` / `Sell`.
    #[prost(string, tag = "3")]
    pub direction: String,
    /// `Open` / `Close`.
    #[prost(string, tag = "4")]
    pub offset: String,
    /// Fill price.
    #[prost(double, tag = "5")]
    pub price: f64,
    /// Fill volume.
    #[prost(int32, tag = "6")]
    pub volume: i32,
}

/// Trading account funds.
#[derive(Clone, PartialEq, Message)]
pub struct AccountUpdate {
    /// Account id.
    #[prost(string, tag = "1")]
    pub account_id: String,
    /// Balance.
    #[prost(double, tag = "2")]
    pub balance: f64,
    /// Available funds.
    #[prost(double, tag = "3")]
    pub available: f64,
    /// Frozen margin plus frozen cash.
    #[prost(double, tag = "4")]
    pub frozen: f64,
}

/// Open position.
#[derive(Clone, PartialEq, Message)]
pub struct PositionUpdate {
    /// Instrument symbol.
    #[prost(string, tag = "1")]
    pub symbol: String,
    /// `Long` / `Short`.
    #[prost(string, tag = "2")]
    pub direction: String,
    /// Position size.
    #[prost(int32, tag = "3")]
    pub volume: i32,
    /// Open cost.
    #[prost(double, tag = "4")]
    pub open_price: f64,
    /// Last price, when the venue reports one.
    #[prost(double, tag = "5")]
    pub last_price: f64,
    /// Position profit.
    #[prost(double, tag = "6")]
    pub pnl: f64,
}

/// Gateway connectivity report.
#[derive(Clone, PartialEq, Message)]
pub struct GatewayStatus {
    /// Gateway instance id.
    #[prost(string, tag = "1")]
    pub gateway_id: String,
    /// Current state.
    #[prost(enumeration = "GatewayState", tag = "2")]
    pub state: i32,
    /// Free-form detail from the venue.
    #[prost(string, tag = "3")]
    pub message: String,
}

/// Gateway session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum GatewayState {
    /// Unknown / not reported.
    Unspecified = 0,
    /// Front connection established.
    Connected = 1,
    /// Logged in and ready.
    LoggedIn = 2,
    /// Front connection lost.
    Disconnected = 3,
}

impl GatewayState {
    /// Proto value name, as used in the canonical JSON mapping.
    pub fn as_str_name(self) -> &'static str {
        match self {
            Self::Unspecified => "GATEWAY_STATE_UNSPECIFIED",
            Self::Connected => "GATEWAY_STATE_CONNECTED",
            Self::LoggedIn => "GATEWAY_STATE_LOGGED_IN",
            Self::Disconnected => "GATEWAY_STATE_DISCONNECTED",
        }
    }
}
