//! Builder pattern for constructing a [`NodeConfig`].

use std::time::Duration;

use tl_domain::config::{NodeConfig, ReconnectConfig};
use tl_domain::error::Result;

/// Fluent builder for [`NodeConfig`].
///
/// # Example
///
/// ```rust,no_run
/// # use tl_client::NodeConfigBuilder;
/// let config = NodeConfigBuilder::new("main")
///     .host("lavalink.internal")
///     .port(2333)
///     .password("youshallnotpass")
///     .resume_key("bot-main")
///     .fallback(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            config: NodeConfig::new(identifier),
        }
    }

    // ── Address ──────────────────────────────────────────────────────

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Use `https` / `wss`.
    pub fn secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Keep players alive across reconnects instead of destroying them.
    pub fn resume_key(mut self, key: impl Into<String>) -> Self {
        self.config.resume_key = Some(key.into());
        self
    }

    /// How long the node holds a resumable session (default 60s).
    pub fn resume_timeout(mut self, d: Duration) -> Self {
        self.config.resume_timeout_secs = d.as_secs();
        self
    }

    /// Move players to another node when this one drops.
    pub fn fallback(mut self, fallback: bool) -> Self {
        self.config.fallback = fallback;
        self
    }

    // ── Timing ───────────────────────────────────────────────────────

    /// Override the WS ping interval (default 120s).
    pub fn heartbeat(mut self, d: Duration) -> Self {
        self.config.heartbeat_secs = d.as_secs().max(1);
        self
    }

    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.config.request_timeout_ms = d.as_millis() as u64;
        self
    }

    pub fn handshake_timeout(mut self, d: Duration) -> Self {
        self.config.handshake_timeout_ms = d.as_millis() as u64;
        self
    }

    /// Override the reconnect back-off policy.
    pub fn reconnect(mut self, cfg: ReconnectConfig) -> Self {
        self.config.reconnect = cfg;
        self
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<NodeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_domain::error::Error;

    #[test]
    fn builds_with_overrides() {
        let cfg = NodeConfigBuilder::new("eu-1")
            .host("10.0.0.5")
            .port(2444)
            .secure(true)
            .resume_key("k")
            .fallback(true)
            .request_timeout(Duration::from_secs(3))
            .build()
            .unwrap();
        assert_eq!(cfg.identifier, "eu-1");
        assert_eq!(cfg.http_uri(), "https://10.0.0.5:2444");
        assert_eq!(cfg.ws_uri(), "wss://10.0.0.5:2444");
        assert_eq!(cfg.resume_key.as_deref(), Some("k"));
        assert!(cfg.fallback);
        assert_eq!(cfg.request_timeout_ms, 3_000);
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let err = NodeConfigBuilder::new("").build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
