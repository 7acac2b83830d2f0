//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Tunables of the web-service client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct WsClientConfig {
    /// Request timeout on limited (metered) connections, in seconds.
    #[validate(range(min = 1_u64, max = 600_u64))]
    pub ws_timeout_secs: u64,
    /// Request timeout on unlimited connections, in seconds.
    #[validate(range(min = 1_u64, max = 600_u64))]
    pub ws_timeout_wifi_secs: u64,
    /// Cooldown when a 429 answer has no usable `Retry-After`.
    #[validate(range(min = 1_u64, max = 3600_u64))]
    pub retry_after_default_secs: u64,
    /// Delay before each queued retry.
    #[validate(range(max = 60_000_u64))]
    pub retry_pacing_ms: u64,
    /// Location hops followed by the native transport and the downloader.
    #[validate(range(max = 20_u32))]
    pub max_redirects: u32,
    /// Times a single call may be queued after a 429. `None` retries forever.
    pub max_retry_attempts: Option<u32>,
    #[validate(length(min = 1_u64))]
    pub user_agent: String,
    /// Sent as `lang` on AJAX calls.
    #[validate(length(min = 1_u64))]
    pub language: String,
}

impl WsClientConfig {
    pub fn new() -> Self {
        Self {
            ws_timeout_secs: 30,
            ws_timeout_wifi_secs: 60,
            retry_after_default_secs: 5,
            retry_pacing_ms: 200,
            max_redirects: 5,
            max_retry_attempts: Some(8),
            user_agent: format!("MoodleMobile/{}", env!("CARGO_PKG_VERSION")),
            language: "en".to_string(),
        }
    }

    /// Timeout for a request given the current connection kind.
    pub fn request_timeout(&self, network_limited: bool) -> Duration {
        if network_limited {
            Duration::from_secs(self.ws_timeout_secs)
        } else {
            Duration::from_secs(self.ws_timeout_wifi_secs)
        }
    }

    pub fn retry_pacing(&self) -> Duration {
        Duration::from_millis(self.retry_pacing_ms)
    }
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WsClientConfig::default();
        assert_eq!(config.request_timeout(true), Duration::from_secs(30));
        assert_eq!(config.request_timeout(false), Duration::from_secs(60));
        assert_eq!(config.retry_pacing(), Duration::from_millis(200));
        assert!(config.user_agent.starts_with("MoodleMobile/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: WsClientConfig = serde_json::from_str(r#"{"ws_timeout_secs": 10}"#).unwrap();
        assert_eq!(config.ws_timeout_secs, 10);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.max_retry_attempts, Some(8));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = WsClientConfig { ws_timeout_secs: 0, ..WsClientConfig::default() };
        assert!(config.validate().is_err());
    }
}
