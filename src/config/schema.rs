//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::session::codec::KeyPair;
use crate::session::options::{Options, DEFAULT_MAX_AGE};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Timeout and body limits.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Session stores.
    pub sessions: SessionsConfig,

    pub admin: AdminConfig,
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

/// Request timeout and size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed to handle one request, in seconds.
    pub request_secs: u64,

    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            max_body_bytes: 2 * 1024 * 1024,
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
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

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
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// All session stores.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Payload kept in a signed cookie.
    pub cookie: StoreConfig,

    /// Payload kept in files, ID in the cookie.
    pub filesystem: StoreConfig,

    /// Server-held sessions.
    pub memory: MemoryConfig,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            cookie: StoreConfig::default(),
            filesystem: StoreConfig {
                enabled: false,
                ..StoreConfig::default()
            },
            memory: MemoryConfig::default(),
        }
    }
}

/// Settings shared by the cookie and filesystem stores.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub enabled: bool,

    /// Cookie lifetime in seconds; also the oldest token accepted on decode.
    pub max_age: i64,

    pub path: String,

    /// Empty means host-only.
    pub domain: String,

    pub secure: bool,

    pub http_only: bool,

    /// Filesystem store only. Empty selects the OS temp directory.
    pub directory: String,

    /// Key pairs, newest first. When empty a random pair is generated at
    /// startup and sessions do not survive a restart.
    pub keys: Vec<KeyConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age: DEFAULT_MAX_AGE,
            path: "/".to_string(),
            domain: String::new(),
            secure: false,
            http_only: true,
            directory: String::new(),
            keys: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Cookie options for sessions created by this store.
    pub fn options(&self) -> Options {
        Options {
            domain: self.domain.clone(),
            path: self.path.clone(),
            max_age: self.max_age,
            secure: self.secure,
            http_only: self.http_only,
        }
    }

    /// Decode the configured keys. An empty list yields one random pair.
    pub fn key_pairs(&self) -> Result<Vec<KeyPair>, String> {
        if self.keys.is_empty() {
            return Ok(vec![KeyPair::generate(true)]);
        }
        self.keys.iter().map(KeyConfig::to_key_pair).collect()
    }
}

/// One base64-encoded key pair.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyConfig {
    /// HMAC key. Required.
    pub hash_key: String,

    /// AES-256 key, 32 bytes once decoded. Omit to sign without encrypting.
    #[serde(default)]
    pub block_key: Option<String>,
}

impl KeyConfig {
    pub fn to_key_pair(&self) -> Result<KeyPair, String> {
        let hash = STANDARD
            .decode(self.hash_key.trim())
            .map_err(|e| format!("hash_key is not valid base64: {}", e))?;
        let block = match &self.block_key {
            Some(encoded) => Some(
                STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| format!("block_key is not valid base64: {}", e))?,
            ),
            None => None,
        };
        KeyPair::new(hash, block).map_err(|e| e.to_string())
    }
}

/// In-memory session manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,

    /// Cookie carrying the session ID.
    pub cookie_name: String,

    /// Idle time after which a session is evicted; also the sweep period.
    pub max_lifetime_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cookie_name: crate::memory::DEFAULT_COOKIE_NAME.to_string(),
            max_lifetime_secs: 3600,
        }
    }
}

impl MemoryConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
