//! A single audio node: REST client, event socket, and player registry.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tl_domain::config::NodeConfig;
use tl_domain::error::{Error, Result};
use tl_domain::trace::TraceEvent;
use tl_domain::version::{Compatibility, Version, VersionPolicy};
use tl_domain::GuildId;
use tl_protocol::rest::{Stats, UpdateSessionRequest};
use tl_protocol::Ready;

use crate::events::ClientEvent;
use crate::player::Player;
use crate::pool::{PoolInner, Shared};
use crate::rest::{NodeState, RestClient};
use crate::socket::{self, SocketState};

/// Cheap-clone handle to a connected node.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    config: NodeConfig,
    state: Arc<NodeState>,
    rest: RestClient,
    stats: RwLock<Option<Stats>>,
    socket_state: RwLock<SocketState>,
    players: RwLock<HashMap<GuildId, Player>>,
    shared: Arc<Shared>,
    pool: Weak<PoolInner>,
    shutdown: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("identifier", &self.identifier())
            .field("available", &self.is_available())
            .field("players", &self.player_count())
            .finish()
    }
}

impl Node {
    /// Check the node's version, open the event socket, wait for `ready`,
    /// and start the supervisor task.
    pub(crate) async fn connect(
        config: NodeConfig,
        shared: Arc<Shared>,
        pool: Weak<PoolInner>,
    ) -> Result<Self> {
        config.validate()?;
        let state = Arc::new(NodeState::new(config.identifier.clone()));
        let rest = RestClient::new(&config, shared.user_id, &shared.client_name, state.clone())?;

        let node = Self {
            inner: Arc::new(NodeInner {
                config,
                state,
                rest,
                stats: RwLock::new(None),
                socket_state: RwLock::new(SocketState::Disconnected),
                players: RwLock::new(HashMap::new()),
                shared,
                pool,
                shutdown: CancellationToken::new(),
                supervisor: Mutex::new(None),
            }),
        };

        node.negotiate_version().await?;

        let (ws, ready) = match socket::open(&node, false).await {
            Ok(pair) => pair,
            Err(e) => {
                node.set_socket_state(SocketState::Disconnected);
                return Err(e);
            }
        };
        node.handle_ready(ready);

        let handle = socket::spawn_supervisor(node.clone(), ws);
        *node.inner.supervisor.lock() = Some(handle);
        Ok(node)
    }

    async fn negotiate_version(&self) -> Result<()> {
        let raw = self
            .inner
            .rest
            .version()
            .await
            .map_err(|e| Error::NodeConnectionFailure {
                node: self.identifier().to_owned(),
                message: format!("version check failed: {e}"),
            })?;

        let version = Version::parse(&raw)?;
        match VersionPolicy::default().check(version) {
            Ok(Compatibility::Supported) => {}
            Ok(Compatibility::BelowRecommended) => {
                tracing::warn!(
                    node = %self.identifier(),
                    version = %version,
                    "node is older than 4.0.0, some features may not work"
                );
            }
            Err(e) => {
                self.inner.state.set_available(false);
                return Err(e);
            }
        }
        self.inner.state.set_version(version);
        Ok(())
    }

    // ── accessors ────────────────────────────────────────────────────

    pub fn identifier(&self) -> &str {
        self.inner.state.identifier()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn rest(&self) -> &RestClient {
        &self.inner.rest
    }

    pub fn is_available(&self) -> bool {
        self.inner.state.is_available()
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.state.session_id()
    }

    pub fn version(&self) -> Option<Version> {
        self.inner.state.version()
    }

    pub fn stats(&self) -> Option<Stats> {
        *self.inner.stats.read()
    }

    pub fn socket_state(&self) -> SocketState {
        *self.inner.socket_state.read()
    }

    pub(crate) fn state(&self) -> &NodeState {
        &self.inner.state
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.inner.shared
    }

    pub(crate) fn pool(&self) -> Option<Arc<PoolInner>> {
        self.inner.pool.upgrade()
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub(crate) fn set_socket_state(&self, state: SocketState) {
        *self.inner.socket_state.write() = state;
    }

    pub(crate) fn set_stats(&self, stats: Stats) {
        *self.inner.stats.write() = Some(stats);
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ── players ──────────────────────────────────────────────────────

    pub fn get_player(&self, guild_id: GuildId) -> Option<Player> {
        self.inner.players.read().get(&guild_id).cloned()
    }

    pub fn players(&self) -> Vec<Player> {
        self.inner.players.read().values().cloned().collect()
    }

    pub fn player_count(&self) -> usize {
        self.inner.players.read().len()
    }

    pub(crate) fn register_player(&self, player: Player) {
        let guild_id = player.guild_id();
        self.inner.players.write().insert(guild_id, player);
        tracing::debug!(node = %self.identifier(), guild_id, "player registered");
    }

    /// Remove the registration only if it still belongs to `player`.
    pub(crate) fn deregister_player(&self, player: &Player) -> bool {
        let mut players = self.inner.players.write();
        match players.get(&player.guild_id()) {
            Some(p) if p.ptr_eq(player) => {
                players.remove(&player.guild_id());
                true
            }
            _ => false,
        }
    }

    /// Move `player`'s registration from `from` to `to` while holding both
    /// maps, so it is never observed in zero or two nodes.
    pub(crate) fn transfer_player(from: &Node, to: &Node, player: &Player) {
        if from.ptr_eq(to) {
            return;
        }
        let guild_id = player.guild_id();
        // Lock in identifier order so two concurrent transfers can't deadlock.
        let (first, second) = if from.identifier() <= to.identifier() {
            (from, to)
        } else {
            (to, from)
        };
        let mut a = first.inner.players.write();
        let mut b = second.inner.players.write();
        let (src, dst) = if first.ptr_eq(from) {
            (&mut *a, &mut *b)
        } else {
            (&mut *b, &mut *a)
        };
        src.remove(&guild_id);
        dst.insert(guild_id, player.clone());
    }

    // ── health ───────────────────────────────────────────────────────

    /// Best-effort TCP round-trip to the node.  `None` when unreachable.
    pub async fn latency(&self) -> Option<Duration> {
        let addr = format!("{}:{}", self.inner.config.host, self.inner.config.port);
        let start = Instant::now();
        match tokio::time::timeout(
            Duration::from_secs(3),
            tokio::net::TcpStream::connect(addr),
        )
        .await
        {
            Ok(Ok(_)) => Some(start.elapsed()),
            _ => None,
        }
    }

    // ── socket callbacks ─────────────────────────────────────────────

    pub(crate) fn handle_ready(&self, ready: Ready) {
        self.inner.state.set_session_id(ready.session_id.clone());
        self.inner.state.set_available(true);
        self.set_socket_state(SocketState::Connected);

        TraceEvent::NodeConnected {
            node: self.identifier().to_owned(),
            session_id: ready.session_id.clone(),
            resumed: ready.resumed,
            version: self.version().map(|v| v.to_string()).unwrap_or_default(),
        }
        .emit();

        if let Some(key) = self.inner.config.resume_key.clone() {
            let node = self.clone();
            tokio::spawn(async move {
                let timeout = node.inner.config.resume_timeout_secs;
                let req = if node.inner.state.api_major() >= 4 {
                    UpdateSessionRequest {
                        resuming: Some(true),
                        timeout: Some(timeout),
                        resuming_key: None,
                    }
                } else {
                    UpdateSessionRequest {
                        resuming: None,
                        timeout: Some(timeout),
                        resuming_key: Some(key),
                    }
                };
                if let Err(e) = node.inner.rest.update_session(&req).await {
                    tracing::warn!(node = %node.identifier(), error = %e, "failed to enable resuming");
                }
            });
        }

        let _ = self.inner.shared.events.send(ClientEvent::NodeReady {
            node: self.identifier().to_owned(),
            session_id: ready.session_id,
            resumed: ready.resumed,
        });
    }

    /// Runs once per socket drop, before any reconnect attempt.
    pub(crate) async fn on_connection_lost(&self, reason: &str) {
        self.inner.state.set_available(false);

        let players = self.players();
        TraceEvent::NodeDisconnected {
            node: self.identifier().to_owned(),
            players: players.len(),
            reason: reason.to_owned(),
        }
        .emit();
        let _ = self.inner.shared.events.send(ClientEvent::NodeDisconnected {
            node: self.identifier().to_owned(),
        });

        if !players.is_empty() && self.inner.config.resume_key.is_none() {
            let count = players.len();
            for player in players {
                if let Err(e) = player.destroy().await {
                    tracing::warn!(
                        node = %self.identifier(),
                        guild_id = player.guild_id(),
                        error = %e,
                        "failed to destroy player after connection loss"
                    );
                }
            }
            TraceEvent::PlayersDestroyed {
                node: self.identifier().to_owned(),
                count,
            }
            .emit();
        }

        if self.inner.config.fallback {
            self.fail_over().await;
        }
    }

    /// Move every remaining player to a random other available node.
    async fn fail_over(&self) {
        let players = self.players();
        if players.is_empty() {
            return;
        }
        let Some(target) = self.pool().and_then(|p| p.fallback_for(self.identifier())) else {
            tracing::warn!(node = %self.identifier(), "no node available for failover");
            return;
        };
        tracing::info!(
            from = %self.identifier(),
            to = %target.identifier(),
            players = players.len(),
            "failing over players"
        );
        for player in players {
            if let Err(e) = player.swap_node(&target).await {
                tracing::warn!(
                    guild_id = player.guild_id(),
                    to = %target.identifier(),
                    error = %e,
                    "player failover failed"
                );
            }
        }
    }

    // ── teardown ─────────────────────────────────────────────────────

    /// Destroy every player, stop the socket, and leave the pool.
    pub async fn disconnect(&self) {
        for player in self.players() {
            if let Err(e) = player.destroy().await {
                tracing::warn!(
                    node = %self.identifier(),
                    guild_id = player.guild_id(),
                    error = %e,
                    "failed to destroy player during disconnect"
                );
            }
        }

        self.inner.shutdown.cancel();
        let handle = self.inner.supervisor.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(2), handle).await.is_err() {
                tracing::debug!(node = %self.identifier(), "supervisor did not stop in time");
            }
        }

        self.inner.state.set_available(false);
        self.set_socket_state(SocketState::Disconnected);
        if let Some(pool) = self.pool() {
            pool.remove_node(self.identifier());
        }
        tracing::info!(node = %self.identifier(), "node disconnected");
    }
}
