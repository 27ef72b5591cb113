//! Node wire protocol: REST request/response shapes, event-socket frames,
//! and the voice payloads relayed from the Discord gateway.
//!
//! Everything here is plain serde data.  Transport lives in `tl-client`.

pub mod patch;
pub mod rest;
pub mod voice;
pub mod ws;

pub(crate) mod snowflake;

pub use patch::Patch;
pub use rest::{
    ErrorResponse, LoadResult, PlayerInfo, PlayerState, RawLoadResult, SearchResult,
    Stats, TrackException, UpdatePlayerRequest, UpdatePlayerTrack, UpdateSessionRequest,
    VoiceState,
};
pub use voice::{VoiceDispatch, VoiceServerUpdate, VoiceStateUpdate};
pub use ws::{InboundFrame, NodeEvent, Ready, TrackEndReason};

/// Highest REST/WebSocket API major version this crate speaks.
pub const API_VERSION: u32 = 4;
