//! REST request and response bodies.

use serde::{Deserialize, Serialize};
use tl_domain::filters::FilterPayload;
use tl_domain::track::{Playlist, Track};
use tl_domain::GuildId;

use crate::patch::Patch;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Track loading
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadType {
    Track,
    Playlist,
    Search,
    Empty,
    Error,
    #[serde(other)]
    Unknown,
}

/// `GET /loadtracks` body before the `data` field is interpreted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLoadResult {
    pub load_type: LoadType,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone)]
pub enum LoadResult {
    Track(Track),
    Playlist(Playlist),
    Search(Vec<Track>),
    Empty,
}

/// Why a load result could not be turned into tracks.
#[derive(Debug, Clone)]
pub enum LoadFailure {
    /// The node reported `loadType: error`.
    Exception(TrackException),
    /// The node sent a load type this crate does not know.
    UnknownType,
    Malformed(String),
}

impl std::fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exception(e) => write!(
                f,
                "{} ({:?})",
                e.message.as_deref().unwrap_or("unknown error"),
                e.severity
            ),
            Self::UnknownType => f.write_str("unknown load type"),
            Self::Malformed(m) => write!(f, "malformed load result: {m}"),
        }
    }
}

impl RawLoadResult {
    pub fn into_result(self) -> Result<LoadResult, LoadFailure> {
        let malformed = |e: serde_json::Error| LoadFailure::Malformed(e.to_string());
        match self.load_type {
            LoadType::Track => serde_json::from_value(self.data)
                .map(LoadResult::Track)
                .map_err(malformed),
            LoadType::Playlist => serde_json::from_value(self.data)
                .map(LoadResult::Playlist)
                .map_err(malformed),
            LoadType::Search => serde_json::from_value(self.data)
                .map(LoadResult::Search)
                .map_err(malformed),
            LoadType::Empty => Ok(LoadResult::Empty),
            LoadType::Error => serde_json::from_value(self.data)
                .map_err(malformed)
                .and_then(|e| Err(LoadFailure::Exception(e))),
            LoadType::Unknown => Err(LoadFailure::UnknownType),
        }
    }
}

impl LoadResult {
    pub fn tracks(&self) -> &[Track] {
        match self {
            Self::Track(t) => std::slice::from_ref(t),
            Self::Playlist(p) => &p.tracks,
            Self::Search(ts) => ts,
            Self::Empty => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Common,
    Suspicious,
    Fault,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackException {
    #[serde(default)]
    pub message: Option<String>,
    pub severity: Severity,
    #[serde(default)]
    pub cause: String,
}

/// LavaSearch `GET /loadsearch` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    pub tracks: Vec<Track>,
    pub albums: Vec<Playlist>,
    pub artists: Vec<Playlist>,
    pub playlists: Vec<Playlist>,
    pub texts: Vec<SearchText>,
    #[serde(rename = "pluginInfo")]
    pub plugin_info: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchText {
    pub text: String,
    #[serde(default)]
    pub plugin: serde_json::Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Body of every non-2xx response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorResponse {
    pub timestamp: i64,
    pub status: u16,
    pub error: String,
    pub trace: Option<String>,
    pub message: String,
    pub path: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Players
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    /// Node-side unix timestamp (ms) of this sample.
    pub time: i64,
    pub position: u64,
    pub connected: bool,
    /// Voice gateway ping in ms, `-1` when not connected.
    pub ping: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    #[serde(with = "crate::snowflake")]
    pub guild_id: GuildId,
    #[serde(default)]
    pub track: Option<Track>,
    pub volume: u16,
    pub paused: bool,
    #[serde(default)]
    pub state: PlayerState,
    #[serde(default)]
    pub voice: VoiceState,
    #[serde(default)]
    pub filters: FilterPayload,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayerTrack {
    #[serde(skip_serializing_if = "Patch::is_unset")]
    pub encoded: Patch<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<serde_json::Value>,
}

/// `PATCH /sessions/{sessionId}/players/{guildId}`.
///
/// Only fields that are set end up in the body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<UpdatePlayerTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(skip_serializing_if = "Patch::is_unset")]
    pub end_time: Patch<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceState>,
}

impl UpdatePlayerRequest {
    pub fn play(encoded: impl Into<String>) -> Self {
        Self {
            track: Some(UpdatePlayerTrack {
                encoded: Patch::Set(encoded.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Stop playback by clearing the track.
    pub fn stop() -> Self {
        Self {
            track: Some(UpdatePlayerTrack {
                encoded: Patch::Clear,
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `PATCH /sessions/{sessionId}`.  v3 nodes take `resumingKey`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resuming: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resuming_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionInfo {
    pub resuming: bool,
    pub timeout: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node info / stats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Memory {
    pub free: u64,
    pub used: u64,
    pub allocated: u64,
    pub reservable: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cpu {
    pub cores: u32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

/// Audio frame counters for the last minute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameStats {
    pub sent: i64,
    pub nulled: i64,
    pub deficit: i64,
}

/// Shared by the `stats` socket frame and `GET /stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub players: u32,
    pub playing_players: u32,
    /// Uptime in milliseconds.
    pub uptime: u64,
    pub memory: Memory,
    pub cpu: Cpu,
    pub frame_stats: Option<FrameStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeVersionInfo {
    pub semver: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub pre_release: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
}

/// `GET /info`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeInfo {
    pub version: NodeVersionInfo,
    pub build_time: i64,
    pub jvm: String,
    pub lavaplayer: String,
    pub source_managers: Vec<String>,
    pub filters: Vec<String>,
    pub plugins: Vec<PluginInfo>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Route planner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `GET /routeplanner/status`.  `class` is null when no planner is
/// configured; `details` depends on the planner implementation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoutePlannerStatus {
    pub class: Option<String>,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreeAddressRequest {
    pub address: String,
}
