//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream game origin and credentials.
    pub upstream: UpstreamConfig,

    /// Relay session settings.
    pub relay: RelaySettings,

    /// Local terminal bridge settings.
    pub terminal: TerminalConfig,

    /// Artifact capture settings.
    pub capture: CaptureConfig,

    /// Static assets served locally instead of being forwarded.
    pub assets: Vec<AssetConfig>,

    /// Response body rewrite rules keyed by request path.
    pub rewrites: Vec<RewriteRule>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Body size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:12450").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:12450".to_string(),
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// HTTP origin (e.g., "http://localhost:4567"). The WebSocket endpoint
    /// is the same authority with the `ws` scheme.
    pub origin: String,

    /// Optional basic-auth credentials attached to every upstream request.
    pub credentials: Option<Credentials>,

    /// Timeout for the upstream WebSocket dial in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:4567".to_string(),
            credentials: None,
            connect_timeout_secs: 10,
        }
    }
}

/// HTTP basic authentication credentials.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Relay session settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelaySettings {
    /// Client liveness pings.
    pub keepalive: KeepaliveConfig,

    /// End the session when a server message fails to decode.
    pub strict_decode: bool,
}

/// Client keepalive configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeepaliveConfig {
    /// Send pings to the client.
    pub enabled: bool,

    /// Interval between pings in seconds.
    pub interval_secs: u64,

    /// Time allowed for a ping to be written and acknowledged, in seconds.
    pub timeout_secs: u64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 15,
            timeout_secs: 5,
        }
    }
}

/// How the terminal bridge acquires its TCP peer.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TerminalMode {
    /// Dial `address` lazily on the first write.
    #[default]
    Connect,
    /// Listen on `address`; every accepted peer replaces the current one.
    Listen,
}

/// Local terminal bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Request path that selects the bridge for upgrade requests.
    pub path: String,

    /// TCP address to dial or listen on.
    pub address: String,

    /// Peer acquisition policy.
    pub mode: TerminalMode,

    /// Dial timeout in seconds (connect mode).
    pub connect_timeout_secs: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            path: "/aux".to_string(),
            address: "localhost:2333".to_string(),
            mode: TerminalMode::Connect,
            connect_timeout_secs: 5,
        }
    }
}

/// Artifact capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Persist map snapshots and challenge payloads.
    pub enabled: bool,

    /// Directory receiving map snapshots.
    pub map_dir: String,

    /// Directory receiving challenge payloads.
    pub challenge_dir: String,

    /// Log a hex dump of every decoded terminal payload.
    pub hex_dump: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            map_dir: "./map".to_string(),
            challenge_dir: "./chall".to_string(),
            hex_dump: true,
        }
    }
}

/// A request path served from a local file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AssetConfig {
    /// Request path (exact match).
    pub path: String,

    /// Local file to serve.
    pub file: String,
}

/// Response rewrite rule for one request path.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RewriteRule {
    /// Request path (exact match).
    pub path: String,

    /// Edits applied in order.
    #[serde(default)]
    pub edits: Vec<BodyEdit>,
}

/// A single find/replace style edit on a response body.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyEdit {
    /// Replace the first `count` occurrences of `find` (all when unset).
    Replace {
        find: String,
        replace: String,
        #[serde(default)]
        count: Option<usize>,
    },
    /// Insert `content` before the first occurrence of `marker`.
    InjectBefore { marker: String, content: String },
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Forwarded request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Body size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest response body buffered for rewriting.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
