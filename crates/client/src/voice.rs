//! The seam between players and the application's Discord gateway.

use async_trait::async_trait;
use tl_domain::error::Result;
use tl_domain::{ChannelId, GuildId};

/// Sends voice-state updates (op 4) through the application's gateway
/// connection.  The library never talks to Discord directly.
#[async_trait]
pub trait VoiceGateway: Send + Sync + 'static {
    /// Join, move, or (with `channel_id: None`) leave voice in a guild.
    async fn update_voice_state(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        self_deaf: bool,
        self_mute: bool,
    ) -> Result<()>;

    /// Whether the channel is still known to the application's cache.
    /// A player whose channel disappears is disconnected locally.
    async fn channel_exists(&self, _guild_id: GuildId, _channel_id: ChannelId) -> bool {
        true
    }
}

/// A gateway that drops every update.  Useful for tools that only talk
/// REST and never join voice.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVoiceGateway;

#[async_trait]
impl VoiceGateway for NoopVoiceGateway {
    async fn update_voice_state(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        _self_deaf: bool,
        _self_mute: bool,
    ) -> Result<()> {
        tracing::trace!(guild_id, ?channel_id, "voice update dropped");
        Ok(())
    }
}
