mod node;

pub use node::*;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::UserId;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The bot's own user id, sent as `User-Id` and used to filter
    /// voice-state updates.
    #[serde(default)]
    pub user_id: UserId,
    #[serde(default = "d_client_name")]
    pub client_name: String,
    /// Capacity of the application event broadcast channel.
    #[serde(default = "d_64")]
    pub event_capacity: usize,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_id: 0,
            client_name: d_client_name(),
            event_capacity: 64,
            nodes: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".into()));
        }
        let mut seen = HashSet::new();
        for node in &self.nodes {
            node.validate()?;
            if !seen.insert(node.identifier.as_str()) {
                return Err(Error::DuplicateIdentifier(node.identifier.clone()));
            }
        }
        Ok(())
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_client_name() -> String {
    concat!("tunelink/", env!("CARGO_PKG_VERSION")).into()
}
fn d_64() -> usize {
    64
}
