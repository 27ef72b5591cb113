//! Frames pushed by the node over the event socket.
//!
//! Frames are tagged by `op`; `event` frames carry a second tag, `type`.
//! Both enums are closed with an `Unknown` catch-all so a newer node never
//! breaks the listen loop.

use serde::{Deserialize, Serialize};
use tl_domain::track::Track;
use tl_domain::GuildId;

use crate::rest::{PlayerState, Stats, TrackException};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum InboundFrame {
    Ready(Ready),
    Stats(Stats),
    PlayerUpdate(PlayerUpdate),
    Event(NodeEvent),
    #[serde(other)]
    Unknown,
}

impl InboundFrame {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::Stats(_) => "stats",
            Self::PlayerUpdate(_) => "playerUpdate",
            Self::Event(_) => "event",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ready {
    #[serde(default)]
    pub resumed: bool,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    #[serde(with = "crate::snowflake")]
    pub guild_id: GuildId,
    pub state: PlayerState,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum NodeEvent {
    #[serde(rename = "TrackStartEvent")]
    TrackStart(TrackStart),
    #[serde(rename = "TrackEndEvent")]
    TrackEnd(TrackEnd),
    #[serde(rename = "TrackExceptionEvent")]
    TrackException(TrackExceptionEvent),
    #[serde(rename = "TrackStuckEvent")]
    TrackStuck(TrackStuck),
    #[serde(rename = "WebSocketClosedEvent")]
    WebSocketClosed(WebSocketClosed),
    #[serde(rename = "WebSocketOpenEvent")]
    WebSocketOpen(WebSocketOpen),
    #[serde(other)]
    Unknown,
}

impl NodeEvent {
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            Self::TrackStart(e) => Some(e.guild_id),
            Self::TrackEnd(e) => Some(e.guild_id),
            Self::TrackException(e) => Some(e.guild_id),
            Self::TrackStuck(e) => Some(e.guild_id),
            Self::WebSocketClosed(e) => Some(e.guild_id),
            Self::WebSocketOpen(e) => Some(e.guild_id),
            Self::Unknown => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TrackStart(_) => "TrackStartEvent",
            Self::TrackEnd(_) => "TrackEndEvent",
            Self::TrackException(_) => "TrackExceptionEvent",
            Self::TrackStuck(_) => "TrackStuckEvent",
            Self::WebSocketClosed(_) => "WebSocketClosedEvent",
            Self::WebSocketOpen(_) => "WebSocketOpenEvent",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStart {
    #[serde(with = "crate::snowflake")]
    pub guild_id: GuildId,
    pub track: Track,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    #[serde(alias = "FINISHED")]
    Finished,
    #[serde(alias = "LOAD_FAILED")]
    LoadFailed,
    #[serde(alias = "STOPPED")]
    Stopped,
    #[serde(alias = "REPLACED")]
    Replaced,
    #[serde(alias = "CLEANUP")]
    Cleanup,
}

impl TrackEndReason {
    /// Whether a queue should advance to the next track.
    pub fn may_start_next(&self) -> bool {
        matches!(self, Self::Finished | Self::LoadFailed)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEnd {
    #[serde(with = "crate::snowflake")]
    pub guild_id: GuildId,
    pub track: Track,
    pub reason: TrackEndReason,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackExceptionEvent {
    #[serde(with = "crate::snowflake")]
    pub guild_id: GuildId,
    pub track: Track,
    pub exception: TrackException,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStuck {
    #[serde(with = "crate::snowflake")]
    pub guild_id: GuildId,
    pub track: Track,
    pub threshold_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketClosed {
    #[serde(with = "crate::snowflake")]
    pub guild_id: GuildId,
    pub code: u16,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub by_remote: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketOpen {
    #[serde(with = "crate::snowflake")]
    pub guild_id: GuildId,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub ssrc: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> serde_json::Value {
        serde_json::json!({
            "encoded": "QAAA",
            "info": { "identifier": "x", "length": 5000, "title": "x", "sourceName": "http" }
        })
    }

    #[test]
    fn parses_ready() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"op":"ready","resumed":false,"sessionId":"la3kfsdf5eafe848"}"#)
                .unwrap();
        match frame {
            InboundFrame::Ready(r) => {
                assert!(!r.resumed);
                assert_eq!(r.session_id, "la3kfsdf5eafe848");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_stats_without_frame_stats() {
        let frame: InboundFrame = serde_json::from_value(serde_json::json!({
            "op": "stats",
            "players": 3,
            "playingPlayers": 1,
            "uptime": 123456789,
            "memory": { "free": 1, "used": 2, "allocated": 3, "reservable": 4 },
            "cpu": { "cores": 4, "systemLoad": 0.5, "lavalinkLoad": 0.1 }
        }))
        .unwrap();
        match frame {
            InboundFrame::Stats(s) => {
                assert_eq!(s.playing_players, 1);
                assert_eq!(s.cpu.cores, 4);
                assert!(s.frame_stats.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_player_update() {
        let frame: InboundFrame = serde_json::from_value(serde_json::json!({
            "op": "playerUpdate",
            "guildId": "42",
            "state": { "time": 1500467109, "position": 60000, "connected": true, "ping": 50 }
        }))
        .unwrap();
        match frame {
            InboundFrame::PlayerUpdate(u) => {
                assert_eq!(u.guild_id, 42);
                assert_eq!(u.state.position, 60_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_track_end_event() {
        let frame: InboundFrame = serde_json::from_value(serde_json::json!({
            "op": "event",
            "type": "TrackEndEvent",
            "guildId": "42",
            "track": track(),
            "reason": "replaced"
        }))
        .unwrap();
        let InboundFrame::Event(NodeEvent::TrackEnd(end)) = frame else {
            panic!("expected track end");
        };
        assert_eq!(end.reason, TrackEndReason::Replaced);
        assert!(!end.reason.may_start_next());
        assert_eq!(end.track.info.length, 5000);
    }

    #[test]
    fn parses_legacy_end_reason() {
        let reason: TrackEndReason = serde_json::from_str(r#""LOAD_FAILED""#).unwrap();
        assert_eq!(reason, TrackEndReason::LoadFailed);
    }

    #[test]
    fn parses_websocket_closed() {
        let frame: InboundFrame = serde_json::from_value(serde_json::json!({
            "op": "event",
            "type": "WebSocketClosedEvent",
            "guildId": "42",
            "code": 4006,
            "reason": "Your session is no longer valid.",
            "byRemote": true
        }))
        .unwrap();
        let InboundFrame::Event(ev) = frame else {
            panic!("expected event");
        };
        assert_eq!(ev.guild_id(), Some(42));
        assert_eq!(ev.kind(), "WebSocketClosedEvent");
    }

    #[test]
    fn unknown_op_and_event_type_are_tolerated() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"op":"somethingNew","x":1}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Unknown));

        let frame: InboundFrame =
            serde_json::from_str(r#"{"op":"event","type":"SegmentSkipped","guildId":"1"}"#)
                .unwrap();
        let InboundFrame::Event(ev) = frame else {
            panic!("expected event");
        };
        assert!(matches!(ev, NodeEvent::Unknown));
        assert_eq!(ev.guild_id(), None);
    }
}
