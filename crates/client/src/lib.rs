//! `tl-client`: async client for Lavalink-compatible audio nodes.
//!
//! An application owns one [`NodePool`].  The pool connects [`Node`]s,
//! each of which keeps a REST client and a long-lived event socket, and
//! hands out per-guild [`Player`]s bound to a node.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  Your bot                                                  │
//! │                                                            │
//! │   let pool = NodePool::new(config, Arc::new(MyGateway))?;  │
//! │   pool.connect_configured().await?;                        │
//! │                                                            │
//! │   let player = pool.create_player(guild, channel, None)?;  │
//! │   player.connect(ConnectOptions::default()).await?;        │
//! │   player.play(track, PlayOptions::default()).await?;       │
//! │                                                            │
//! │   // forward VOICE_* dispatches from your gateway          │
//! │   pool.handle_gateway_payload(&raw).await?;                │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Connection flow
//!
//! 1. `GET /version`, reject nodes older than 3.7
//! 2. Open `/v{major}/websocket` with `Authorization`, `User-Id`, `Client-Name`
//! 3. Wait for `ready { sessionId }`, then enable resuming if configured
//! 4. Listen loop: `stats`, `playerUpdate`, `event` frames routed per guild
//! 5. On drop: destroy or fail over players, reconnect with jittered back-off

pub mod builder;
pub mod events;
pub mod node;
pub mod player;
pub mod pool;
pub mod reconnect;
pub mod rest;
pub mod socket;
pub mod voice;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::NodeConfigBuilder;
pub use events::ClientEvent;
pub use node::Node;
pub use player::{ConnectOptions, PlayOptions, Player, PlayerStatus};
pub use pool::{NodeAlgorithm, NodePool};
pub use reconnect::ReconnectBackoff;
pub use rest::{RestClient, SearchOptions, SearchType};
pub use socket::SocketState;
pub use voice::{NoopVoiceGateway, VoiceGateway};

// Re-export domain types so applications rarely need tl-domain directly.
pub use tl_domain::config::{ClientConfig, NodeConfig, ReconnectConfig};
pub use tl_domain::error::{Error, Result};
pub use tl_domain::filters::{Filter, FilterChain, TaggedFilter};
pub use tl_domain::track::{Playlist, RequestContext, Track};
pub use tl_protocol::{LoadResult, TrackEndReason};
