//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the account service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Database location.
    pub database: DatabaseConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Per-route fixed-window rate limits.
    pub ip_rate_limiter: IpRateLimiterConfig,

    /// Per-route request body ceilings.
    pub body_limit: BodyLimitConfig,

    /// Cap on accounts registered from one IP.
    pub account_per_ip_limiter: AccountPerIpConfig,

    /// Proof-of-work gate on registration.
    pub proof_of_work: PowSection,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Optional TLS configuration. When present, session cookies carry the
    /// `Secure` attribute.
    pub tls: Option<TlsConfig>,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            tls: None,
            request_timeout_secs: 30,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file path.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "gatehouse.db".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Pretty, verbose logs when true; JSON logs when false.
    pub debug: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            debug: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// One fixed-window rate limit.
///
/// `enable` defaults to false: a section that is absent from the config file
/// must not silently rate limit anything.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub enable: bool,

    /// Maximum requests per key within one window.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enable: false,
            max_requests: 10,
            window_ms: 1_000,
        }
    }
}

/// Per-route rate limit sections.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IpRateLimiterConfig {
    pub register: RateLimitSection,
    pub login: RateLimitSection,
    pub logout: RateLimitSection,
    pub profile: RateLimitSection,
}

/// One request-body ceiling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyLimitSection {
    pub enable: bool,

    /// Maximum body size in bytes. Non-positive values are clamped to the
    /// built-in default at guard construction, never to "unlimited".
    pub max_body_bytes: i64,
}

impl Default for BodyLimitSection {
    fn default() -> Self {
        Self {
            enable: false,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Per-route body limit sections (only routes that accept bodies).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BodyLimitConfig {
    pub register: BodyLimitSection,
    pub login: BodyLimitSection,
}

/// Cap on accounts registered from a single IP.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountPerIpConfig {
    pub enable: bool,

    /// Maximum accounts per IP. Non-positive disables the cap.
    pub max_accounts: i64,
}

impl Default for AccountPerIpConfig {
    fn default() -> Self {
        Self {
            enable: false,
            max_accounts: 3,
        }
    }
}

/// Proof-of-work configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PowSection {
    pub enable: bool,

    /// Required leading zero bits in the solution hash.
    pub difficulty: u8,

    /// Challenge time-to-live in seconds.
    pub ttl_seconds: i64,

    /// Base64-encoded HMAC key; must decode to at least 16 bytes when
    /// proof-of-work is enabled.
    pub secret_key: String,
}

impl Default for PowSection {
    fn default() -> Self {
        Self {
            enable: false,
            difficulty: 12,
            ttl_seconds: 120,
            secret_key: String::new(),
        }
    }
}

impl Config {
    /// Effective per-IP account cap, `None` when the check is off.
    ///
    /// A non-positive threshold counts as disabled, matching the limiter's
    /// always-allow contract.
    pub fn account_cap(&self) -> Option<i64> {
        if self.account_per_ip_limiter.enable && self.account_per_ip_limiter.max_accounts > 0 {
            Some(self.account_per_ip_limiter.max_accounts)
        } else {
            None
        }
    }
}
