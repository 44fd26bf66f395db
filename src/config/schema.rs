//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::{Backoff, RetryPolicy};

/// Default upstream that receives every request no local route claims.
pub const DEFAULT_UPSTREAM_URL: &str = "https://starlight.allofus.dev";

/// Default root of the remote content store used by local handlers.
pub const DEFAULT_CONTENT_ROOT: &str =
    "https://raw.githubusercontent.com/ivan2282-i28/MoonLightRepo/refs/heads/main/";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream that unmatched requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Remote content store read by the local handlers.
    pub content: ContentConfig,

    /// Header names stripped on each leg of a forwarded call.
    pub headers: HeaderConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream (fallback) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL; the inbound path and query are appended verbatim.
    pub base_url: String,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Follow 3xx responses from the upstream.
    pub follow_redirects: bool,

    /// Maximum redirect hops when following.
    pub max_redirects: usize,

    /// Client identifier injected when the caller sent no `user-agent`.
    pub user_agent: String,

    /// Run forwarded calls through the retry executor.
    pub retry: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_URL.to_string(),
            timeout_secs: 30,
            follow_redirects: true,
            max_redirects: 10,
            user_agent: concat!("fallback-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: false,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Content store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Root URL every content path is resolved against.
    pub root_url: String,

    /// Per-fetch timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root_url: DEFAULT_CONTENT_ROOT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ContentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Header filtering sets, matched case-insensitively.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Removed from the inbound request before it is sent upstream.
    pub strip_request: Vec<String>,

    /// Removed from the upstream response before it is relayed.
    pub strip_response: Vec<String>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            strip_request: vec![
                "host".to_string(),
                "content-length".to_string(),
                "content-encoding".to_string(),
            ],
            strip_response: vec![
                "transfer-encoding".to_string(),
                "content-length".to_string(),
            ],
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for every later one.
    pub base_delay_ms: u64,

    /// Optional ceiling for a single backoff delay.
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 1000,
            max_delay_ms: None,
        }
    }
}

impl RetryConfig {
    /// Freeze into the immutable policy value handed to the executor.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Backoff::Exponential {
                base: Duration::from_millis(self.base_delay_ms),
                max: self.max_delay_ms.map(Duration::from_millis),
            },
        )
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest inbound body buffered for forwarding.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
