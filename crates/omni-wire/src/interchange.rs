//! JSON projection of decoded frames for WebSocket clients.
//!
//! Follows the protobuf canonical JSON mapping with proto field names kept
//! as-is (`source_id`, not `sourceId`), which is the shape existing browser
//! clients read:
//!
//! - `int64` → decimal string, `int32` → number
//! - `double` → number; NaN and infinities → `"NaN"`, `"Infinity"`, `"-Infinity"`
//! - enums → value name; values the schema does not know → raw integer
//! - scalars at their default value are omitted; a set oneof message is
//!   always emitted, even when empty

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{
    AccountUpdate, EventFrame, GatewayState, GatewayStatus, MarketData, OrderUpdate,
    PositionUpdate, TradeUpdate, event_frame::Payload,
};

/// Client-facing form of one [`EventFrame`].
///
/// Keys are ordered, so two projections of the same frame serialize to the
/// same bytes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InterchangeEvent(Map<String, Value>);

impl InterchangeEvent {
    /// Borrow the underlying JSON object.
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into a [`Value`].
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Serialize to a single-line JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }
}

/// Project a decoded frame into its interchange form.
pub fn to_interchange(frame: &EventFrame) -> InterchangeEvent {
    let mut obj = JsonObject::default();
    obj.int64("timestamp_ns", frame.timestamp_ns);
    obj.string("source_id", &frame.source_id);
    match &frame.payload {
        Some(Payload::Tick(m)) => obj.message("tick", market_data(m)),
        Some(Payload::Order(m)) => obj.message("order", order_update(m)),
        Some(Payload::Trade(m)) => obj.message("trade", trade_update(m)),
        Some(Payload::Account(m)) => obj.message("account", account_update(m)),
        Some(Payload::Position(m)) => obj.message("position", position_update(m)),
        Some(Payload::Status(m)) => obj.message("status", gateway_status(m)),
        None => {}
    }
    InterchangeEvent(obj.0)
}

fn market_data(m: &MarketData) -> JsonObject {
    let mut obj = JsonObject::default();
    obj.string("symbol", &m.symbol);
    obj.string("exchange", &m.exchange);
    obj.double("last_price", m.last_price);
    obj.int32("volume", m.volume);
    obj.double("open_interest", m.open_interest);
    obj
}

fn order_update(m: &OrderUpdate) -> JsonObject {
    let mut obj = JsonObject::default();
    obj.string("order_id", &m.order_id);
    obj.string("symbol", &m.symbol);
    obj.string("direction", &m.direction);
    obj.string("offset", &m.offset);
    obj.double("price", m.price);
    obj.int32("volume", m.volume);
    obj.string("status", &m.status);
    obj
}

fn trade_update(m: &TradeUpdate) -> JsonObject {
    let mut obj = JsonObject::default();
    obj.string("trade_id", &m.trade_id);
    obj.string("symbol", &m.symbol);
    obj.string("direction", &m.direction);
    obj.string("offset", &m.offset);
    obj.double("price", m.price);
    obj.int32("volume", m.volume);
    obj
}

fn account_update(m: &AccountUpdate) -> JsonObject {
    let mut obj = JsonObject::default();
    obj.string("account_id", &m.account_id);
    obj.double("balance", m.balance);
    obj.double("available", m.available);
    obj.double("frozen", m.frozen);
    obj
}

fn position_update(m: &PositionUpdate) -> JsonObject {
    let mut obj = JsonObject::default();
    obj.string("symbol", &m.symbol);
    obj.string("direction", &m.direction);
    obj.int32("volume", m.volume);
    obj.double("open_price", m.open_price);
    obj.double("last_price", m.last_price);
    obj.double("pnl", m.pnl);
    obj
}

fn gateway_status(m: &GatewayStatus) -> JsonObject {
    let mut obj = JsonObject::default();
    obj.string("gateway_id", &m.gateway_id);
    obj.enumeration(
        "state",
        m.state,
        GatewayState::try_from(m.state).ok().map(GatewayState::as_str_name),
    );
    obj.string("message", &m.message);
    obj
}

/// Builder applying the default-omission rules field by field.
#[derive(Default)]
struct JsonObject(Map<String, Value>);

impl JsonObject {
    fn put(&mut self, name: &str, value: Value) {
        let _ = self.0.insert(name.to_owned(), value);
    }

    fn string(&mut self, name: &str, v: &str) {
        if !v.is_empty() {
            self.put(name, Value::String(v.to_owned()));
        }
    }

    fn int32(&mut self, name: &str, v: i32) {
        if v != 0 {
            self.put(name, Value::from(v));
        }
    }

    fn int64(&mut self, name: &str, v: i64) {
        if v != 0 {
            self.put(name, Value::String(v.to_string()));
        }
    }

    #[allow(clippy::float_cmp)]
    fn double(&mut self, name: &str, v: f64) {
        if v == 0.0 && v.is_sign_positive() {
            return;
        }
        let value = if v.is_nan() {
            Value::String("NaN".into())
        } else if v.is_infinite() {
            Value::String(if v > 0.0 { "Infinity" } else { "-Infinity" }.into())
        } else {
            Value::from(v)
        };
        self.put(name, value);
    }

    fn enumeration(&mut self, name: &str, raw: i32, known: Option<&'static str>) {
        if raw == 0 {
            return;
        }
        match known {
            Some(label) => self.put(name, Value::String(label.into())),
            None => self.put(name, Value::from(raw)),
        }
    }

    fn message(&mut self, name: &str, nested: JsonObject) {
        self.put(name, Value::Object(nested.0));
    }
}
