//! Listener settings.

use serde::{Deserialize, Serialize};

/// HTTP/WebSocket listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Maximum concurrent WebSocket clients.
    pub max_connections: usize,
    /// Interval between server pings, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Silence after which a client is dropped, in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Per-client outbound queue capacity (messages).
    pub send_queue_capacity: usize,
    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_connections: 1_000,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            send_queue_capacity: 256,
            max_message_size: 64 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.port, 8000);
        assert_eq!(s.heartbeat_interval_secs, 30);
        assert_eq!(s.heartbeat_timeout_secs, 90);
        assert_eq!(s.send_queue_capacity, 256);
    }

    #[test]
    fn camel_case_keys() {
        let json = serde_json::to_value(ServerSettings::default()).unwrap();
        assert!(json.get("maxConnections").is_some());
        assert!(json.get("heartbeatIntervalSecs").is_some());
        assert!(json.get("max_connections").is_none());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s: ServerSettings = serde_json::from_str(r#"{"port": 9001}"#).unwrap();
        assert_eq!(s.port, 9001);
        assert_eq!(s.host, "0.0.0.0");
    }
}
