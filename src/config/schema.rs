//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file. Every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};

/// Root configuration for the forwarding proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// Outbound client settings.
    pub upstream: UpstreamConfig,

    /// Cross-origin response headers.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to listen on. Overridden by the `PORT` environment variable.
    pub port: u16,
}

impl ListenerConfig {
    /// Combined `host:port` bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Port used when neither the config file nor `PORT` sets one.
pub const DEFAULT_PORT: u16 = 10000;

/// What the outbound client does with 3xx responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedirectPolicy {
    /// Relay the redirect response itself, `Location` untouched.
    #[default]
    None,
    /// Follow up to `max_redirects` hops and relay the final response.
    Follow,
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// TCP/TLS connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Time allowed for the upstream to produce response headers, in seconds.
    /// Body streaming is not bounded by this.
    pub dispatch_timeout_secs: u64,

    /// Redirect handling.
    pub redirect: RedirectPolicy,

    /// Hop limit when `redirect = "follow"`.
    pub max_redirects: usize,

    /// How long an idle pooled connection is kept, in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Idle connections kept per upstream host. 0 disables reuse.
    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            dispatch_timeout_secs: 60,
            redirect: RedirectPolicy::None,
            max_redirects: 10,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
        }
    }
}

/// CORS header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Value of `Access-Control-Allow-Methods`.
    pub allow_methods: String,

    /// Emit `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_methods: "GET, POST, PUT, DELETE, PATCH, OPTIONS".to_string(),
            allow_credentials: true,
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

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
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
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
