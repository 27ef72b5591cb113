//! The node pool: owns every [`Node`], picks one for new players, and
//! routes voice updates from the application's gateway.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use rand::seq::IndexedRandom;
use tokio::sync::broadcast;
use tl_domain::config::{ClientConfig, NodeConfig};
use tl_domain::error::{Error, Result};
use tl_domain::{ChannelId, GuildId, UserId};
use tl_protocol::{VoiceDispatch, VoiceServerUpdate, VoiceStateUpdate};

use crate::events::ClientEvent;
use crate::node::Node;
use crate::player::Player;
use crate::voice::VoiceGateway;

/// How [`NodePool::get_best_node`] ranks available nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAlgorithm {
    /// Lowest TCP connect latency.
    ByPing,
    /// Fewest registered players.
    ByPlayers,
}

/// Handles every node and player needs, fixed for the pool's lifetime.
pub(crate) struct Shared {
    pub(crate) user_id: UserId,
    pub(crate) client_name: String,
    pub(crate) voice: Arc<dyn VoiceGateway>,
    pub(crate) events: broadcast::Sender<ClientEvent>,
}

pub(crate) struct PoolInner {
    config: ClientConfig,
    nodes: RwLock<HashMap<String, Node>>,
    /// Identifiers whose `create_node` is still connecting.
    pending: Mutex<HashSet<String>>,
    shared: Arc<Shared>,
}

impl PoolInner {
    fn available(&self) -> Vec<Node> {
        self.nodes
            .read()
            .values()
            .filter(|n| n.is_available())
            .cloned()
            .collect()
    }

    /// A random available node other than `exclude`.
    pub(crate) fn fallback_for(&self, exclude: &str) -> Option<Node> {
        let candidates: Vec<Node> = self
            .available()
            .into_iter()
            .filter(|n| n.identifier() != exclude)
            .collect();
        candidates.choose(&mut rand::rng()).cloned()
    }

    pub(crate) fn remove_node(&self, identifier: &str) {
        if self.nodes.write().remove(identifier).is_some() {
            tracing::debug!(node = %identifier, "node removed from pool");
        }
    }
}

/// Cheap-clone handle to a set of nodes.  Create one per application and
/// pass it where needed.
#[derive(Clone)]
pub struct NodePool {
    inner: Arc<PoolInner>,
}

impl NodePool {
    pub fn new(config: ClientConfig, voice: Arc<dyn VoiceGateway>) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);
        let shared = Arc::new(Shared {
            user_id: config.user_id,
            client_name: config.client_name.clone(),
            voice,
            events,
        });
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                nodes: RwLock::new(HashMap::new()),
                pending: Mutex::new(HashSet::new()),
                shared,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Receive track, socket, and node events from every node.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.shared.events.subscribe()
    }

    // ── nodes ────────────────────────────────────────────────────────

    /// Connect every node listed in the pool's config.
    pub async fn connect_configured(&self) -> Result<Vec<Node>> {
        let mut connected = Vec::with_capacity(self.inner.config.nodes.len());
        for cfg in self.inner.config.nodes.clone() {
            connected.push(self.create_node(cfg).await?);
        }
        Ok(connected)
    }

    /// Connect a node and add it to the pool.  Nothing is registered when
    /// the connect fails.
    pub async fn create_node(&self, config: NodeConfig) -> Result<Node> {
        let identifier = config.identifier.clone();
        {
            let nodes = self.inner.nodes.read();
            let mut pending = self.inner.pending.lock();
            if nodes.contains_key(&identifier) || !pending.insert(identifier.clone()) {
                return Err(Error::DuplicateIdentifier(identifier));
            }
        }

        let result = Node::connect(
            config,
            self.inner.shared.clone(),
            Arc::downgrade(&self.inner),
        )
        .await;
        self.inner.pending.lock().remove(&identifier);

        let node = result?;
        self.inner
            .nodes
            .write()
            .insert(identifier.clone(), node.clone());
        tracing::info!(
            node = %identifier,
            session_id = ?node.session_id(),
            version = ?node.version().map(|v| v.to_string()),
            "node connected"
        );
        Ok(node)
    }

    /// Exact lookup among available nodes, or a uniformly random one.
    pub fn get_node(&self, identifier: Option<&str>) -> Result<Node> {
        let available = self.inner.available();
        if available.is_empty() {
            return Err(Error::NoNodesAvailable);
        }
        match identifier {
            Some(id) => available
                .into_iter()
                .find(|n| n.identifier() == id)
                .ok_or_else(|| Error::UnknownIdentifier(id.to_owned())),
            None => available
                .choose(&mut rand::rng())
                .cloned()
                .ok_or(Error::NoNodesAvailable),
        }
    }

    pub async fn get_best_node(&self, algorithm: NodeAlgorithm) -> Result<Node> {
        let available = self.inner.available();
        match algorithm {
            NodeAlgorithm::ByPlayers => least_loaded(available),
            NodeAlgorithm::ByPing => {
                let latencies = join_all(available.iter().map(Node::latency)).await;
                available
                    .into_iter()
                    .zip(latencies)
                    .min_by_key(|(_, latency)| latency.unwrap_or(Duration::MAX))
                    .map(|(node, _)| node)
                    .ok_or(Error::NoNodesAvailable)
            }
        }
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.inner.nodes.read().values().cloned().collect()
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.read().len()
    }

    /// Disconnect a node, destroying its players, and drop it from the pool.
    pub async fn destroy_node(&self, identifier: &str) -> Result<()> {
        let node = self
            .inner
            .nodes
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| Error::UnknownIdentifier(identifier.to_owned()))?;
        node.disconnect().await;
        Ok(())
    }

    pub async fn disconnect_all(&self) {
        for node in self.nodes() {
            node.disconnect().await;
        }
    }

    // ── players ──────────────────────────────────────────────────────

    /// Return the guild's player, creating it on `node_id` (or the least
    /// loaded node) if there is none yet.
    pub fn create_player(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        node_id: Option<&str>,
    ) -> Result<Player> {
        if let Some(player) = self.get_player(guild_id) {
            return Ok(player);
        }
        let node = match node_id {
            Some(_) => self.get_node(node_id)?,
            None => least_loaded(self.inner.available())?,
        };
        let player = Player::new(guild_id, Some(channel_id), node.clone());
        node.register_player(player.clone());
        Ok(player)
    }

    pub fn get_player(&self, guild_id: GuildId) -> Option<Player> {
        self.inner
            .nodes
            .read()
            .values()
            .find_map(|n| n.get_player(guild_id))
    }

    // ── voice routing ────────────────────────────────────────────────

    pub async fn handle_voice_server_update(&self, update: VoiceServerUpdate) -> Result<()> {
        match self.get_player(update.guild_id) {
            Some(player) => player.on_voice_server_update(&update).await,
            None => {
                tracing::debug!(guild_id = update.guild_id, "voice server update for unknown guild");
                Ok(())
            }
        }
    }

    /// Only updates about the bot user are routed.
    pub async fn handle_voice_state_update(&self, update: VoiceStateUpdate) -> Result<()> {
        if update.user_id != self.inner.shared.user_id {
            return Ok(());
        }
        match self.get_player(update.guild_id) {
            Some(player) => player.on_voice_state_update(&update).await,
            None => {
                tracing::debug!(guild_id = update.guild_id, "voice state update for unknown guild");
                Ok(())
            }
        }
    }

    /// Feed a raw gateway payload.  Anything other than the two voice
    /// dispatches is ignored.
    pub async fn handle_gateway_payload(&self, payload: &serde_json::Value) -> Result<()> {
        match VoiceDispatch::from_gateway(payload)? {
            Some(VoiceDispatch::Server(update)) => self.handle_voice_server_update(update).await,
            Some(VoiceDispatch::State(update)) => self.handle_voice_state_update(update).await,
            None => Ok(()),
        }
    }
}

fn least_loaded(nodes: Vec<Node>) -> Result<Node> {
    nodes
        .into_iter()
        .min_by_key(Node::player_count)
        .ok_or(Error::NoNodesAvailable)
}
