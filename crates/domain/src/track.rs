//! Track and playlist value objects.
//!
//! Tracks deserialize straight from the node's wire shape.  Local-only
//! attributes (identity, request context, per-track filters) are skipped
//! on the wire and filled in on this side.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filters::TaggedFilter;
use crate::UserId;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Track
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    #[serde(default)]
    pub is_seekable: bool,
    #[serde(default)]
    pub author: String,
    /// Length in milliseconds.
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_stream: bool,
    /// Start position in milliseconds.
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub source_name: String,
}

/// Who asked for a track and why.  Attached to search results by copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub requester: Option<UserId>,
    pub description: Option<String>,
}

impl RequestContext {
    pub fn requested_by(user: UserId) -> Self {
        Self {
            requester: Some(user),
            description: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requester.is_none() && self.description.is_none()
    }
}

/// A playable track.
///
/// Equality is by [`Track::uid`], which is generated when the track is
/// first decoded and carried by every copy made from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub plugin_info: serde_json::Value,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub user_data: serde_json::Value,

    #[serde(skip, default = "Uuid::new_v4")]
    pub uid: Uuid,
    #[serde(skip)]
    pub requester: Option<UserId>,
    #[serde(skip)]
    pub description: Option<String>,
    /// Filters applied (as preload filters) when this track starts.
    #[serde(skip)]
    pub filters: Vec<TaggedFilter>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for Track {}

impl Track {
    pub fn new(encoded: impl Into<String>, info: TrackInfo) -> Self {
        Self {
            encoded: encoded.into(),
            info,
            plugin_info: serde_json::Value::Null,
            user_data: serde_json::Value::Null,
            uid: Uuid::new_v4(),
            requester: None,
            description: None,
            filters: Vec::new(),
        }
    }

    /// Copy of this track carrying the given request context.
    pub fn with_context(&self, ctx: &RequestContext) -> Self {
        let mut copy = self.clone();
        if ctx.requester.is_some() {
            copy.requester = ctx.requester;
        }
        if ctx.description.is_some() {
            copy.description = ctx.description.clone();
        }
        copy
    }

    /// Copy of this track with per-track filters attached.
    pub fn with_filters(&self, filters: Vec<TaggedFilter>) -> Self {
        let mut copy = self.clone();
        copy.filters = filters;
        copy
    }

    pub fn length(&self) -> u64 {
        self.info.length
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn is_stream(&self) -> bool {
        self.info.is_stream
    }

    pub fn is_seekable(&self) -> bool {
        self.info.is_seekable
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Playlist
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: String,
    /// `-1` when no track is selected.
    #[serde(default = "d_selected")]
    pub selected_track: i64,
}

fn d_selected() -> i64 {
    -1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub info: PlaylistInfo,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub plugin_info: serde_json::Value,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Total length of all tracks, in milliseconds.
    pub fn length(&self) -> u64 {
        self.tracks.iter().map(|t| t.info.length).sum()
    }

    pub fn selected(&self) -> Option<&Track> {
        usize::try_from(self.info.selected_track)
            .ok()
            .and_then(|i| self.tracks.get(i))
    }

    pub fn with_context(&self, ctx: &RequestContext) -> Self {
        Self {
            info: self.info.clone(),
            plugin_info: self.plugin_info.clone(),
            tracks: self.tracks.iter().map(|t| t.with_context(ctx)).collect(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_track(title: &str, length: u64) -> Track {
    Track::new(
        format!("enc:{title}"),
        TrackInfo {
            identifier: title.to_owned(),
            is_seekable: true,
            author: "tester".into(),
            length,
            is_stream: false,
            position: 0,
            title: title.to_owned(),
            uri: None,
            artwork_url: None,
            isrc: None,
            source_name: "http".into(),
        },
    )
}
