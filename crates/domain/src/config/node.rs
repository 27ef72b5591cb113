use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub identifier: String,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_password")]
    pub password: String,
    /// Use `https`/`wss` instead of `http`/`ws`.
    #[serde(default)]
    pub secure: bool,
    /// WebSocket ping interval.
    #[serde(default = "d_120")]
    pub heartbeat_secs: u64,
    /// When set, the session is kept alive across socket drops and
    /// players survive a reconnect.
    #[serde(default)]
    pub resume_key: Option<String>,
    #[serde(default = "d_60")]
    pub resume_timeout_secs: u64,
    /// Move players to another node when this one drops.
    #[serde(default)]
    pub fallback: bool,
    #[serde(default = "d_10000")]
    pub request_timeout_ms: u64,
    /// How long to wait for the `ready` frame after the socket opens.
    #[serde(default = "d_10000")]
    pub handshake_timeout_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl NodeConfig {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            host: d_host(),
            port: d_port(),
            password: d_password(),
            secure: false,
            heartbeat_secs: 120,
            resume_key: None,
            resume_timeout_secs: 60,
            fallback: false,
            request_timeout_ms: 10_000,
            handshake_timeout_ms: 10_000,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() {
            return Err(Error::Config("node identifier must not be empty".into()));
        }
        if self.host.trim().is_empty() {
            return Err(Error::Config(format!(
                "node {}: host must not be empty",
                self.identifier
            )));
        }
        if self.heartbeat_secs == 0 {
            return Err(Error::Config(format!(
                "node {}: heartbeat_secs must be at least 1",
                self.identifier
            )));
        }
        Ok(())
    }

    /// `http[s]://host:port`
    pub fn http_uri(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// `ws[s]://host:port`
    pub fn ws_uri(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconnect policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "d_7000")]
    pub initial_delay_ms: u64,
    #[serde(default = "d_300000")]
    pub max_delay_ms: u64,
    #[serde(default = "d_factor")]
    pub backoff_factor: f64,
    /// `0` means retry forever.
    #[serde(default)]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 7000,
            max_delay_ms: 300_000,
            backoff_factor: 2.0,
            max_attempts: 0,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_port() -> u16 {
    2333
}
fn d_password() -> String {
    "youshallnotpass".into()
}
fn d_120() -> u64 {
    120
}
fn d_60() -> u64 {
    60
}
fn d_10000() -> u64 {
    10_000
}
fn d_7000() -> u64 {
    7000
}
fn d_300000() -> u64 {
    300_000
}
fn d_factor() -> f64 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uris_follow_secure_flag() {
        let mut cfg = NodeConfig::new("main");
        assert_eq!(cfg.http_uri(), "http://127.0.0.1:2333");
        assert_eq!(cfg.ws_uri(), "ws://127.0.0.1:2333");
        cfg.secure = true;
        cfg.host = "lava.example.com".into();
        cfg.port = 443;
        assert_eq!(cfg.http_uri(), "https://lava.example.com:443");
        assert_eq!(cfg.ws_uri(), "wss://lava.example.com:443");
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let cfg = NodeConfig::new("  ");
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn minimal_toml_gets_defaults() {
        let cfg: NodeConfig = toml::from_str(r#"identifier = "eu-1""#).unwrap();
        assert_eq!(cfg.port, 2333);
        assert_eq!(cfg.heartbeat_secs, 120);
        assert_eq!(cfg.resume_timeout_secs, 60);
        assert!(!cfg.fallback);
        assert_eq!(cfg.reconnect.initial_delay_ms, 7000);
    }
}
