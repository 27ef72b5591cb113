//! Per-guild playback handle.
//!
//! A [`Player`] is bound to exactly one [`Node`] at a time.  Frames for its
//! guild arrive through a single-consumer inbox, so track events and state
//! samples are applied in the order the node sent them.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tl_domain::error::{Error, Result};
use tl_domain::filters::{Filter, FilterChain, TaggedFilter};
use tl_domain::trace::TraceEvent;
use tl_domain::track::{RequestContext, Track};
use tl_domain::{ChannelId, GuildId};
use tl_protocol::rest::{UpdatePlayerTrack, VoiceState};
use tl_protocol::{
    LoadResult, NodeEvent, Patch, PlayerState, TrackEndReason, UpdatePlayerRequest,
    VoiceServerUpdate, VoiceStateUpdate,
};

use crate::events::ClientEvent;
use crate::node::Node;
use crate::pool::Shared;
use crate::rest::SearchOptions;

pub const MAX_VOLUME: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    Connected,
    Playing,
    Paused,
    Destroyed,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    pub self_deaf: bool,
    pub self_mute: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            self_deaf: true,
            self_mute: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    /// Start offset in milliseconds.
    pub start: Option<u64>,
    /// Stop playback at this offset in milliseconds.
    pub end: Option<u64>,
    /// Leave a currently playing track alone.  Defaults to `false`, so
    /// `play` replaces whatever is playing.
    pub no_replace: bool,
    pub volume: Option<u16>,
}

/// Frames routed from the event socket to a player's inbox.
#[derive(Debug)]
pub(crate) enum Inbound {
    Event(NodeEvent),
    State(PlayerState),
}

#[derive(Debug, Default)]
struct VoiceCredentials {
    token: Option<String>,
    endpoint: Option<String>,
    session_id: Option<String>,
}

impl VoiceCredentials {
    fn complete(&self) -> Option<VoiceState> {
        match (&self.token, &self.endpoint, &self.session_id) {
            (Some(token), Some(endpoint), Some(session_id)) => Some(VoiceState {
                token: token.clone(),
                endpoint: endpoint.clone(),
                session_id: session_id.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct PlayerData {
    channel_id: Option<ChannelId>,
    current: Option<Track>,
    ending_track: Option<Track>,
    volume: u16,
    paused: bool,
    connected: bool,
    destroyed: bool,
    last_position: u64,
    last_update: Option<DateTime<Utc>>,
    ping: i64,
    node_connected: bool,
    filters: FilterChain,
    voice: VoiceCredentials,
    self_deaf: bool,
    self_mute: bool,
}

impl PlayerData {
    fn new(channel_id: Option<ChannelId>) -> Self {
        Self {
            channel_id,
            current: None,
            ending_track: None,
            volume: 100,
            paused: false,
            connected: false,
            destroyed: false,
            last_position: 0,
            last_update: None,
            ping: -1,
            node_connected: false,
            filters: FilterChain::new(),
            voice: VoiceCredentials::default(),
            self_deaf: true,
            self_mute: false,
        }
    }

    fn position(&self) -> u64 {
        let Some(ref track) = self.current else {
            return 0;
        };
        if self.paused {
            return self.last_position.min(track.length());
        }
        let elapsed = self
            .last_update
            .map(|at| (Utc::now() - at).num_milliseconds().max(0) as u64)
            .unwrap_or(0);
        (self.last_position + elapsed).min(track.length())
    }

    /// The copy of `track` we handed out, so events carry its request context.
    fn resolve(&self, track: Track) -> Track {
        [&self.current, &self.ending_track]
            .into_iter()
            .flatten()
            .find(|t| t.encoded == track.encoded)
            .cloned()
            .unwrap_or(track)
    }
}

struct PlayerInner {
    guild_id: GuildId,
    node: Mutex<Node>,
    data: Mutex<PlayerData>,
    inbox: mpsc::UnboundedSender<Inbound>,
}

/// Cheap-clone handle; every clone refers to the same player.
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = self.inner.data.lock();
        f.debug_struct("Player")
            .field("guild_id", &self.inner.guild_id)
            .field("channel_id", &d.channel_id)
            .field("connected", &d.connected)
            .field("current", &d.current.as_ref().map(|t| t.title().to_owned()))
            .finish()
    }
}

impl Player {
    pub(crate) fn new(guild_id: GuildId, channel_id: Option<ChannelId>, node: Node) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Self {
            inner: Arc::new(PlayerInner {
                guild_id,
                node: Mutex::new(node),
                data: Mutex::new(PlayerData::new(channel_id)),
                inbox: tx,
            }),
        };
        tokio::spawn(run_inbox(Arc::downgrade(&player.inner), rx));
        player
    }

    pub(crate) fn deliver(&self, msg: Inbound) {
        if self.inner.inbox.send(msg).is_err() {
            tracing::debug!(guild_id = self.inner.guild_id, "player inbox closed");
        }
    }

    pub fn ptr_eq(&self, other: &Player) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn shared(&self) -> Arc<Shared> {
        self.node().shared().clone()
    }

    async fn send(&self, req: &UpdatePlayerRequest, no_replace: bool) -> Result<()> {
        let node = self.node();
        node.rest()
            .update_player(self.inner.guild_id, req, no_replace)
            .await
    }

    // ── accessors ────────────────────────────────────────────────────

    pub fn guild_id(&self) -> GuildId {
        self.inner.guild_id
    }

    pub fn node(&self) -> Node {
        self.inner.node.lock().clone()
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.inner.data.lock().channel_id
    }

    pub fn current(&self) -> Option<Track> {
        self.inner.data.lock().current.clone()
    }

    pub fn volume(&self) -> u16 {
        self.inner.data.lock().volume
    }

    pub fn filters(&self) -> FilterChain {
        self.inner.data.lock().filters.clone()
    }

    /// Voice gateway ping reported by the node, `-1` when unknown.
    pub fn ping(&self) -> i64 {
        self.inner.data.lock().ping
    }

    pub fn is_connected(&self) -> bool {
        self.inner.data.lock().connected
    }

    pub fn is_playing(&self) -> bool {
        let d = self.inner.data.lock();
        d.connected && d.current.is_some()
    }

    pub fn is_paused(&self) -> bool {
        let d = self.inner.data.lock();
        d.connected && d.paused
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.data.lock().destroyed
    }

    pub fn status(&self) -> PlayerStatus {
        let d = self.inner.data.lock();
        if d.destroyed {
            PlayerStatus::Destroyed
        } else if !d.connected {
            PlayerStatus::Idle
        } else if d.current.is_none() {
            PlayerStatus::Connected
        } else if d.paused {
            PlayerStatus::Paused
        } else {
            PlayerStatus::Playing
        }
    }

    /// Playback position in milliseconds, interpolated from the last state
    /// sample and capped at the track length.
    pub fn position(&self) -> u64 {
        self.inner.data.lock().position()
    }

    pub fn rate(&self) -> f64 {
        self.inner.data.lock().filters.rate()
    }

    pub fn adjusted_position(&self) -> f64 {
        let d = self.inner.data.lock();
        d.position() as f64 / d.filters.rate()
    }

    pub fn adjusted_length(&self) -> f64 {
        let d = self.inner.data.lock();
        match d.current {
            Some(ref t) => t.length() as f64 / d.filters.rate(),
            None => 0.0,
        }
    }

    // ── voice ────────────────────────────────────────────────────────

    pub async fn connect(&self, opts: ConnectOptions) -> Result<()> {
        let channel = self
            .channel_id()
            .ok_or_else(|| Error::Voice("player has no channel to join".into()))?;
        self.shared()
            .voice
            .update_voice_state(self.inner.guild_id, Some(channel), opts.self_deaf, opts.self_mute)
            .await?;

        self.node().register_player(self.clone());
        let mut d = self.inner.data.lock();
        d.connected = true;
        d.destroyed = false;
        d.self_deaf = opts.self_deaf;
        d.self_mute = opts.self_mute;
        Ok(())
    }

    /// Move to another voice channel in the same guild.
    pub async fn move_to(&self, channel_id: ChannelId) -> Result<()> {
        let (deaf, mute) = {
            let d = self.inner.data.lock();
            (d.self_deaf, d.self_mute)
        };
        self.shared()
            .voice
            .update_voice_state(self.inner.guild_id, Some(channel_id), deaf, mute)
            .await?;
        self.inner.data.lock().channel_id = Some(channel_id);
        Ok(())
    }

    /// Leave voice.  Local state is cleared even if the gateway call fails.
    pub async fn disconnect(&self) -> Result<()> {
        let result = self
            .shared()
            .voice
            .update_voice_state(self.inner.guild_id, None, false, false)
            .await;
        let mut d = self.inner.data.lock();
        d.connected = false;
        d.channel_id = None;
        result
    }

    pub async fn on_voice_server_update(&self, update: &VoiceServerUpdate) -> Result<()> {
        {
            let mut d = self.inner.data.lock();
            d.voice.token = Some(update.token.clone());
            d.voice.endpoint = update.endpoint.clone();
        }
        self.dispatch_voice_update().await
    }

    pub async fn on_voice_state_update(&self, update: &VoiceStateUpdate) -> Result<()> {
        self.inner.data.lock().voice.session_id = Some(update.session_id.clone());

        let still_there = match update.channel_id {
            Some(channel) => {
                self.shared()
                    .voice
                    .channel_exists(self.inner.guild_id, channel)
                    .await
            }
            None => false,
        };
        if !still_there {
            let mut d = self.inner.data.lock();
            d.connected = false;
            d.channel_id = None;
            d.voice = VoiceCredentials::default();
            tracing::debug!(guild_id = self.inner.guild_id, "left voice, cleared voice state");
            return Ok(());
        }

        self.inner.data.lock().channel_id = update.channel_id;
        self.dispatch_voice_update().await
    }

    /// Forward voice credentials once token, endpoint and session id are
    /// all known.
    async fn dispatch_voice_update(&self) -> Result<()> {
        let Some(voice) = self.inner.data.lock().voice.complete() else {
            return Ok(());
        };
        let endpoint = voice.endpoint.clone();
        let req = UpdatePlayerRequest {
            voice: Some(voice),
            ..Default::default()
        };
        self.send(&req, false).await?;
        tracing::debug!(guild_id = self.inner.guild_id, endpoint = %endpoint, "voice update dispatched");
        Ok(())
    }

    // ── playback ─────────────────────────────────────────────────────

    /// Start `track`.  It becomes `current` before the request is sent so
    /// a fast `TrackStart` resolves to it; a failed request restores the
    /// previous track.
    pub async fn play(&self, track: Track, opts: PlayOptions) -> Result<Track> {
        if let Some(v) = opts.volume {
            if v > MAX_VOLUME {
                return Err(Error::InvalidVolume(v));
            }
        }

        let (previous, filters, volume) = {
            let mut d = self.inner.data.lock();
            let previous = d.current.replace(track.clone());

            let mut chain = d.filters.clone();
            let mut changed = chain.remove_preload() > 0;
            if !track.filters.is_empty() && !chain.has_global() {
                for f in &track.filters {
                    let mut f = f.clone();
                    f.preload = true;
                    match chain.add(f) {
                        Ok(()) => changed = true,
                        Err(e) => tracing::warn!(
                            guild_id = self.inner.guild_id,
                            error = %e,
                            "skipping track filter"
                        ),
                    }
                }
            }
            (previous, changed.then_some(chain), opts.volume.unwrap_or(d.volume))
        };

        let user_data = (!track.user_data.is_null()).then(|| track.user_data.clone());
        let req = UpdatePlayerRequest {
            track: Some(UpdatePlayerTrack {
                encoded: Patch::Set(track.encoded.clone()),
                user_data,
                ..Default::default()
            }),
            position: opts.start,
            end_time: opts.end.map_or(Patch::Unset, Patch::Set),
            volume: Some(volume),
            paused: Some(false),
            filters: filters.as_ref().map(FilterChain::payload),
            ..Default::default()
        };

        match self.send(&req, opts.no_replace).await {
            Ok(()) => {
                let mut d = self.inner.data.lock();
                d.paused = false;
                d.volume = volume;
                d.last_position = opts.start.unwrap_or(0);
                d.last_update = Some(Utc::now());
                if let Some(chain) = filters {
                    d.filters = chain;
                }
                tracing::debug!(
                    guild_id = self.inner.guild_id,
                    title = %track.title(),
                    length = track.length(),
                    "playing track"
                );
                Ok(track)
            }
            Err(e) => {
                let mut d = self.inner.data.lock();
                if d.current.as_ref() == Some(&track) {
                    d.current = previous;
                }
                Err(e)
            }
        }
    }

    /// Seek within the current track.  Returns the new position, or `0`
    /// when nothing is playing.
    pub async fn seek(&self, position: i64) -> Result<u64> {
        let Some(length) = self.inner.data.lock().current.as_ref().map(Track::length) else {
            return Ok(0);
        };
        if position < 0 || position as u64 > length {
            return Err(Error::InvalidSeekPosition { position, length });
        }
        let position = position as u64;

        let req = UpdatePlayerRequest {
            position: Some(position),
            ..Default::default()
        };
        self.send(&req, false).await?;

        let mut d = self.inner.data.lock();
        d.last_position = position;
        d.last_update = Some(Utc::now());
        Ok(position)
    }

    /// `None` toggles.  Returns the new paused state.
    pub async fn set_pause(&self, pause: Option<bool>) -> Result<bool> {
        let target = pause.unwrap_or_else(|| !self.inner.data.lock().paused);
        let req = UpdatePlayerRequest {
            paused: Some(target),
            ..Default::default()
        };
        self.send(&req, false).await?;

        let mut d = self.inner.data.lock();
        if target && !d.paused {
            d.last_position = d.position();
        }
        d.last_update = Some(Utc::now());
        d.paused = target;
        Ok(target)
    }

    pub async fn set_volume(&self, volume: u16) -> Result<u16> {
        if volume > MAX_VOLUME {
            return Err(Error::InvalidVolume(volume));
        }
        let req = UpdatePlayerRequest {
            volume: Some(volume),
            ..Default::default()
        };
        self.send(&req, false).await?;
        self.inner.data.lock().volume = volume;
        Ok(volume)
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(&UpdatePlayerRequest::stop(), false).await?;
        self.inner.data.lock().current = None;
        tracing::debug!(guild_id = self.inner.guild_id, "player stopped");
        Ok(())
    }

    // ── filters ──────────────────────────────────────────────────────

    pub async fn add_filter(&self, filter: TaggedFilter) -> Result<()> {
        self.apply_filters(|chain| chain.add(filter)).await
    }

    pub async fn remove_filter(&self, tag: &str) -> Result<()> {
        self.apply_filters(|chain| chain.remove(tag).map(|_| ())).await
    }

    pub async fn edit_filter(&self, tag: &str, filter: Filter) -> Result<()> {
        self.apply_filters(|chain| chain.edit(tag, filter)).await
    }

    pub async fn reset_filters(&self) -> Result<()> {
        self.apply_filters(|chain| {
            chain.reset();
            Ok(())
        })
        .await
    }

    /// Mutate a copy of the chain, push the whole payload, commit, then
    /// seek to the current position so the node re-applies the effects.
    async fn apply_filters<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut FilterChain) -> Result<()>,
    {
        let chain = {
            let mut chain = self.inner.data.lock().filters.clone();
            mutate(&mut chain)?;
            chain
        };
        let req = UpdatePlayerRequest {
            filters: Some(chain.payload()),
            ..Default::default()
        };
        self.send(&req, false).await?;
        self.inner.data.lock().filters = chain;

        let position = self.position();
        self.seek(position as i64).await?;
        Ok(())
    }

    // ── node-side events ─────────────────────────────────────────────

    fn dispatch_event(&self, event: NodeEvent) {
        let out = {
            let mut d = self.inner.data.lock();
            match event {
                NodeEvent::TrackStart(e) => {
                    let track = d.resolve(e.track);
                    if d.current.is_none() {
                        d.current = Some(track.clone());
                    }
                    d.ending_track = Some(track.clone());
                    ClientEvent::TrackStart {
                        player: self.clone(),
                        track,
                    }
                }
                NodeEvent::TrackEnd(e) => {
                    let track = d.resolve(e.track);
                    if e.reason != TrackEndReason::Replaced {
                        d.current = None;
                    }
                    ClientEvent::TrackEnd {
                        player: self.clone(),
                        track,
                        reason: e.reason,
                    }
                }
                NodeEvent::TrackStuck(e) => ClientEvent::TrackStuck {
                    player: self.clone(),
                    track: d.resolve(e.track),
                    threshold_ms: e.threshold_ms,
                },
                NodeEvent::TrackException(e) => ClientEvent::TrackException {
                    player: self.clone(),
                    track: d.resolve(e.track),
                    exception: e.exception,
                },
                NodeEvent::WebSocketClosed(e) => ClientEvent::WebSocketClosed {
                    guild_id: e.guild_id,
                    code: e.code,
                    reason: e.reason,
                    by_remote: e.by_remote,
                },
                NodeEvent::WebSocketOpen(e) => ClientEvent::WebSocketOpen {
                    guild_id: e.guild_id,
                    target: e.target,
                    ssrc: e.ssrc,
                },
                NodeEvent::Unknown => return,
            }
        };
        tracing::debug!(guild_id = self.inner.guild_id, event = out.name(), "dispatching event");
        let _ = self.shared().events.send(out);
    }

    fn update_state(&self, state: PlayerState) {
        let mut d = self.inner.data.lock();
        d.last_position = state.position;
        d.last_update = Some(Utc::now());
        d.node_connected = state.connected;
        d.ping = state.ping;
    }

    /// Whether the node reports its voice connection as up.
    pub fn node_connected(&self) -> bool {
        self.inner.data.lock().node_connected
    }

    // ── lifecycle ────────────────────────────────────────────────────

    /// Rebind to `target`, moving the registration atomically and
    /// replaying voice, track, and position on the new node.
    pub async fn swap_node(&self, target: &Node) -> Result<()> {
        let old = self.node();
        if old.ptr_eq(target) {
            return Ok(());
        }

        let (position, encoded, paused, volume, filters) = {
            let d = self.inner.data.lock();
            (
                d.position(),
                d.current.as_ref().map(|t| t.encoded.clone()),
                d.paused,
                d.volume,
                d.filters.clone(),
            )
        };

        Node::transfer_player(&old, target, self);
        *self.inner.node.lock() = target.clone();

        self.dispatch_voice_update().await?;
        if let Some(encoded) = encoded {
            let req = UpdatePlayerRequest {
                track: Some(UpdatePlayerTrack {
                    encoded: Patch::Set(encoded),
                    ..Default::default()
                }),
                position: Some(position),
                paused: Some(paused),
                volume: Some(volume),
                filters: (!filters.is_empty()).then(|| filters.payload()),
                ..Default::default()
            };
            self.send(&req, false).await?;
        }

        TraceEvent::PlayerMigrated {
            guild_id: self.inner.guild_id,
            from_node: old.identifier().to_owned(),
            to_node: target.identifier().to_owned(),
            position_ms: position,
        }
        .emit();
        Ok(())
    }

    /// Leave voice, drop the registration, and destroy the remote player.
    /// Calling it again is a no-op.
    pub async fn destroy(&self) -> Result<()> {
        {
            let mut d = self.inner.data.lock();
            if d.destroyed {
                return Ok(());
            }
            d.destroyed = true;
        }

        if let Err(e) = self.disconnect().await {
            tracing::warn!(guild_id = self.inner.guild_id, error = %e, "voice disconnect failed");
        }

        let node = self.node();
        node.deregister_player(self);
        if node.is_available() {
            node.rest().destroy_player(self.inner.guild_id).await?;
        }
        tracing::debug!(guild_id = self.inner.guild_id, node = %node.identifier(), "player destroyed");
        Ok(())
    }

    // ── REST passthrough ─────────────────────────────────────────────

    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<LoadResult> {
        self.node().rest().search(query, opts).await
    }

    pub async fn decode_track(&self, encoded: &str) -> Result<Track> {
        self.node().rest().decode_track(encoded).await
    }

    pub async fn recommendations(
        &self,
        seed_tracks: &[Track],
        ctx: &RequestContext,
    ) -> Result<LoadResult> {
        self.node().rest().recommendations(seed_tracks, ctx).await
    }
}

async fn run_inbox(player: Weak<PlayerInner>, mut rx: mpsc::UnboundedReceiver<Inbound>) {
    while let Some(msg) = rx.recv().await {
        let Some(inner) = player.upgrade() else {
            break;
        };
        let player = Player { inner };
        match msg {
            Inbound::Event(event) => player.dispatch_event(event),
            Inbound::State(state) => player.update_state(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_domain::track::TrackInfo;

    fn track(encoded: &str, length: u64) -> Track {
        Track::new(
            encoded,
            TrackInfo {
                identifier: encoded.into(),
                length,
                title: encoded.into(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn position_is_capped_and_frozen_while_paused() {
        let mut d = PlayerData::new(None);
        assert_eq!(d.position(), 0);

        d.current = Some(track("a", 10_000));
        d.last_position = 9_500;
        d.last_update = Some(Utc::now() - chrono::Duration::seconds(5));
        assert_eq!(d.position(), 10_000);

        d.paused = true;
        d.last_position = 4_000;
        assert_eq!(d.position(), 4_000);
    }

    #[test]
    fn resolve_prefers_handed_out_copy() {
        let mut d = PlayerData::new(None);
        let ours = track("enc", 1_000).with_context(&RequestContext::requested_by(7));
        d.current = Some(ours.clone());

        let from_node = track("enc", 1_000);
        let resolved = d.resolve(from_node);
        assert_eq!(resolved, ours);
        assert_eq!(resolved.requester, Some(7));

        let other = track("other", 1_000);
        let resolved = d.resolve(other.clone());
        assert_eq!(resolved, other);
    }

    #[test]
    fn play_replaces_by_default() {
        let opts = PlayOptions::default();
        assert!(!opts.no_replace);
        assert!(opts.start.is_none() && opts.end.is_none());
    }

    #[test]
    fn voice_credentials_need_all_three() {
        let mut v = VoiceCredentials::default();
        v.token = Some("t".into());
        v.endpoint = Some("e".into());
        assert!(v.complete().is_none());
        v.session_id = Some("s".into());
        let state = v.complete().unwrap();
        assert_eq!(state.session_id, "s");
    }
}
