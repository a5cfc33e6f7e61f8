//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`: the settings
//! file may be partial and missing fields keep their compiled default.

mod broker;
mod server;

pub use broker::*;
pub use server::*;

use omni_logging::{LogFormat, LogLevel};
use serde::{Deserialize, Serialize};

/// Root settings type for the relay.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "broker": { "url": "amqp://relay:secret@mq:5672/%2f" },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// HTTP/WebSocket listener settings.
    pub server: ServerSettings,
    /// Upstream broker subscription settings.
    pub broker: BrokerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
}
