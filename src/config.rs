//! Bizbot configuration management

use serde::{Deserialize, Serialize};

/// Main bizbot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Poll loop configuration
    #[serde(default)]
    pub poll: PollConfig,

    /// Per-call retry configuration for transport operations
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP transport binding configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Dispatch precedence configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between successful poll requests in milliseconds
    pub interval_ms: u64,

    /// Consecutive poll failures tolerated before the run loop gives up
    pub max_consecutive_failures: u32,

    /// Base backoff delay after a failed poll in milliseconds
    pub backoff_base_ms: u64,

    /// Upper bound on the backoff delay in milliseconds
    pub backoff_cap_ms: u64,

    /// Number of recently delivered event identifiers kept for dedup
    pub dedup_capacity: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_consecutive_failures: 10,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 60_000,
            dedup_capacity: 1_024,
        }
    }
}

/// Per-call retry configuration for transport operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Timeout applied to every transport call in milliseconds
    pub request_timeout_ms: u64,

    /// Retries attempted for transient failures before surfacing the error
    pub max_retries: u32,

    /// Base backoff delay between retries in milliseconds
    pub backoff_base_ms: u64,

    /// Upper bound on the retry backoff delay in milliseconds
    pub backoff_cap_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 45_000,
            max_retries: 3,
            backoff_base_ms: 250,
            backoff_cap_ms: 10_000,
        }
    }
}

/// HTTP transport binding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL of the platform API
    pub base_url: String,

    /// Client type reported on login (e.g. "PC")
    pub client_type: String,

    /// Device type reported on login
    pub device_type: String,

    /// Keep-alive interval requested from the event endpoint in seconds
    pub ping_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://chat.example.biz".to_string(),
            client_type: "PC".to_string(),
            device_type: String::new(),
            ping_secs: 60,
        }
    }
}

/// Order applied to the three handler priority groups during dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOrder {
    /// Exact matches, then category wildcards, then global wildcards
    #[default]
    SpecificFirst,
    /// Global wildcards, then category wildcards, then exact matches
    WildcardFirst,
}

/// Dispatch precedence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Precedence among overlapping handler registrations
    pub order: DispatchOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.poll.max_consecutive_failures, 10);
        assert_eq!(config.poll.dedup_capacity, 1_024);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.dispatch.order, DispatchOrder::SpecificFirst);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BotConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: BotConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.poll.interval_ms, config.poll.interval_ms);
        assert_eq!(parsed.http.client_type, "PC");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: BotConfig = toml::from_str(
            r#"
            [poll]
            interval_ms = 50
            max_consecutive_failures = 2
            backoff_base_ms = 10
            backoff_cap_ms = 100
            dedup_capacity = 8
            "#,
        )
        .unwrap();
        assert_eq!(parsed.poll.interval_ms, 50);
        assert_eq!(parsed.retry.max_retries, 3);
    }

    #[test]
    fn test_dispatch_order_wire_names() {
        let parsed: DispatchConfig = toml::from_str("order = \"wildcard_first\"").unwrap();
        assert_eq!(parsed.order, DispatchOrder::WildcardFirst);
    }
}
