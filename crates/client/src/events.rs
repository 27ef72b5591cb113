//! Events delivered to the application through [`NodePool::subscribe`].
//!
//! [`NodePool::subscribe`]: crate::pool::NodePool::subscribe

use tl_domain::track::Track;
use tl_domain::GuildId;
use tl_protocol::rest::TrackException;
use tl_protocol::TrackEndReason;

use crate::player::Player;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    TrackStart {
        player: Player,
        track: Track,
    },
    TrackEnd {
        player: Player,
        track: Track,
        reason: TrackEndReason,
    },
    TrackStuck {
        player: Player,
        track: Track,
        threshold_ms: u64,
    },
    TrackException {
        player: Player,
        track: Track,
        exception: TrackException,
    },
    /// The node's voice connection to Discord closed.
    WebSocketClosed {
        guild_id: GuildId,
        code: u16,
        reason: String,
        by_remote: bool,
    },
    WebSocketOpen {
        guild_id: GuildId,
        target: String,
        ssrc: u32,
    },
    NodeReady {
        node: String,
        session_id: String,
        resumed: bool,
    },
    NodeDisconnected {
        node: String,
    },
}

impl ClientEvent {
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            Self::TrackStart { player, .. }
            | Self::TrackEnd { player, .. }
            | Self::TrackStuck { player, .. }
            | Self::TrackException { player, .. } => Some(player.guild_id()),
            Self::WebSocketClosed { guild_id, .. } | Self::WebSocketOpen { guild_id, .. } => {
                Some(*guild_id)
            }
            Self::NodeReady { .. } | Self::NodeDisconnected { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TrackStart { .. } => "track_start",
            Self::TrackEnd { .. } => "track_end",
            Self::TrackStuck { .. } => "track_stuck",
            Self::TrackException { .. } => "track_exception",
            Self::WebSocketClosed { .. } => "websocket_closed",
            Self::WebSocketOpen { .. } => "websocket_open",
            Self::NodeReady { .. } => "node_ready",
            Self::NodeDisconnected { .. } => "node_disconnected",
        }
    }
}
