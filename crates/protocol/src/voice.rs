//! Voice payloads relayed from the Discord gateway.
//!
//! The library never talks to Discord itself; the application forwards
//! `VOICE_SERVER_UPDATE` / `VOICE_STATE_UPDATE` dispatches and the pool
//! routes them to the right player.

use serde::{Deserialize, Serialize};
use tl_domain::{ChannelId, GuildId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceServerUpdate {
    #[serde(with = "crate::snowflake")]
    pub guild_id: GuildId,
    pub token: String,
    /// Null while Discord is reallocating the voice server.
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    #[serde(with = "crate::snowflake")]
    pub guild_id: GuildId,
    #[serde(with = "crate::snowflake")]
    pub user_id: UserId,
    pub session_id: String,
    /// `None` when the user left voice.
    #[serde(default, with = "crate::snowflake::option")]
    pub channel_id: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceDispatch {
    Server(VoiceServerUpdate),
    State(VoiceStateUpdate),
}

#[derive(Deserialize)]
struct GatewayDispatch {
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: serde_json::Value,
}

impl VoiceDispatch {
    /// Pick the voice dispatches out of a raw gateway payload
    /// (`{"op":0,"t":"...","d":{...}}`).  Anything else yields `Ok(None)`.
    pub fn from_gateway(raw: &serde_json::Value) -> serde_json::Result<Option<Self>> {
        let dispatch = GatewayDispatch::deserialize(raw)?;
        match dispatch.t.as_deref() {
            Some("VOICE_SERVER_UPDATE") => {
                Ok(Some(Self::Server(serde_json::from_value(dispatch.d)?)))
            }
            Some("VOICE_STATE_UPDATE") => {
                Ok(Some(Self::State(serde_json::from_value(dispatch.d)?)))
            }
            _ => Ok(None),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::Server(s) => s.guild_id,
            Self::State(s) => s.guild_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_voice_server_update() {
        let raw = serde_json::json!({
            "op": 0,
            "t": "VOICE_SERVER_UPDATE",
            "d": { "token": "abc", "guild_id": "41771983423143937", "endpoint": "smart.loyal.discord.gg" }
        });
        let dispatch = VoiceDispatch::from_gateway(&raw).unwrap().unwrap();
        assert_eq!(dispatch.guild_id(), 41_771_983_423_143_937);
        match dispatch {
            VoiceDispatch::Server(s) => assert_eq!(s.endpoint.as_deref(), Some("smart.loyal.discord.gg")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn voice_state_with_null_channel() {
        let raw = serde_json::json!({
            "op": 0,
            "t": "VOICE_STATE_UPDATE",
            "d": {
                "guild_id": "1",
                "user_id": "2",
                "session_id": "s",
                "channel_id": null,
                "deaf": false
            }
        });
        let Some(VoiceDispatch::State(s)) = VoiceDispatch::from_gateway(&raw).unwrap() else {
            panic!("expected voice state");
        };
        assert_eq!(s.user_id, 2);
        assert!(s.channel_id.is_none());
    }

    #[test]
    fn other_dispatches_are_ignored() {
        let raw = serde_json::json!({ "op": 0, "t": "MESSAGE_CREATE", "d": {} });
        assert!(VoiceDispatch::from_gateway(&raw).unwrap().is_none());
        let hello = serde_json::json!({ "op": 10, "d": { "heartbeat_interval": 41250 } });
        assert!(VoiceDispatch::from_gateway(&hello).unwrap().is_none());
    }
}
