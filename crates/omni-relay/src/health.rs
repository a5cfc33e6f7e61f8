//! `/health` and `/` endpoint bodies.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Static banner served at `/`.
pub const SERVICE_BANNER: &str = "OmniQuant Data Service is Running";

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// When the server started (RFC 3339).
    pub started_at: String,
    /// Current WebSocket connection count.
    pub connections: usize,
}

/// `/` response body.
#[derive(Debug, Clone, Serialize)]
pub struct BannerResponse {
    /// Service banner.
    pub message: &'static str,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    started_at: DateTime<Utc>,
    connections: usize,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        started_at: started_at.to_rfc3339(),
        connections,
    }
}

/// The static service banner.
pub fn banner() -> BannerResponse {
    BannerResponse {
        message: SERVICE_BANNER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), Utc::now(), 0);
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, Utc::now(), 0);
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serialization() {
        let resp = health_check(Instant::now(), Utc::now(), 2);
        let parsed = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 2);
        assert!(parsed["uptime_secs"].is_number());
        assert!(parsed["started_at"].is_string());
    }

    #[test]
    fn banner_text() {
        let json = serde_json::to_value(banner()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "OmniQuant Data Service is Running"})
        );
    }
}
