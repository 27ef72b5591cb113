//! Audio filters and the per-player filter chain.
//!
//! A chain holds at most one filter per [`FilterKind`], each under a unique
//! tag.  Filters attached from a track are marked `preload` and dropped
//! when the next track starts.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Filter settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqualizerBand {
    /// Band index, 0..=14.
    pub band: u8,
    /// Gain multiplier, -0.25..=1.0.
    pub gain: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Karaoke {
    pub level: f64,
    pub mono_level: f64,
    pub filter_band: f64,
    pub filter_width: f64,
}

impl Default for Karaoke {
    fn default() -> Self {
        Self {
            level: 1.0,
            mono_level: 1.0,
            filter_band: 220.0,
            filter_width: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timescale {
    pub speed: f64,
    pub pitch: f64,
    pub rate: f64,
}

impl Default for Timescale {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
            rate: 1.0,
        }
    }
}

impl Timescale {
    /// The classic "nightcore" preset.
    pub fn nightcore() -> Self {
        Self {
            speed: 1.25,
            pitch: 1.3,
            rate: 1.0,
        }
    }

    pub fn vaporwave() -> Self {
        Self {
            speed: 0.8,
            pitch: 0.8,
            rate: 1.0,
        }
    }
}

/// Shared shape of tremolo and vibrato.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oscillation {
    pub frequency: f64,
    pub depth: f64,
}

impl Default for Oscillation {
    fn default() -> Self {
        Self {
            frequency: 2.0,
            depth: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rotation {
    pub rotation_hz: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distortion {
    pub sin_offset: f64,
    pub sin_scale: f64,
    pub cos_offset: f64,
    pub cos_scale: f64,
    pub tan_offset: f64,
    pub tan_scale: f64,
    pub offset: f64,
    pub scale: f64,
}

impl Default for Distortion {
    fn default() -> Self {
        Self {
            sin_offset: 0.0,
            sin_scale: 1.0,
            cos_offset: 0.0,
            cos_scale: 1.0,
            tan_offset: 0.0,
            tan_scale: 1.0,
            offset: 0.0,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMix {
    pub left_to_left: f64,
    pub left_to_right: f64,
    pub right_to_left: f64,
    pub right_to_right: f64,
}

impl Default for ChannelMix {
    fn default() -> Self {
        Self {
            left_to_left: 1.0,
            left_to_right: 0.0,
            right_to_left: 0.0,
            right_to_right: 1.0,
        }
    }
}

impl ChannelMix {
    pub fn mono() -> Self {
        Self {
            left_to_left: 0.5,
            left_to_right: 0.5,
            right_to_left: 0.5,
            right_to_right: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowPass {
    pub smoothing: f64,
}

impl Default for LowPass {
    fn default() -> Self {
        Self { smoothing: 20.0 }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Filter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Volume,
    Equalizer,
    Karaoke,
    Timescale,
    Tremolo,
    Vibrato,
    Rotation,
    Distortion,
    ChannelMix,
    LowPass,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::Equalizer => "equalizer",
            Self::Karaoke => "karaoke",
            Self::Timescale => "timescale",
            Self::Tremolo => "tremolo",
            Self::Vibrato => "vibrato",
            Self::Rotation => "rotation",
            Self::Distortion => "distortion",
            Self::ChannelMix => "channelMix",
            Self::LowPass => "lowPass",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Filter-level volume multiplier, 0.0..=5.0.
    Volume(f64),
    Equalizer(Vec<EqualizerBand>),
    Karaoke(Karaoke),
    Timescale(Timescale),
    Tremolo(Oscillation),
    Vibrato(Oscillation),
    Rotation(Rotation),
    Distortion(Distortion),
    ChannelMix(ChannelMix),
    LowPass(LowPass),
}

impl Filter {
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Volume(_) => FilterKind::Volume,
            Self::Equalizer(_) => FilterKind::Equalizer,
            Self::Karaoke(_) => FilterKind::Karaoke,
            Self::Timescale(_) => FilterKind::Timescale,
            Self::Tremolo(_) => FilterKind::Tremolo,
            Self::Vibrato(_) => FilterKind::Vibrato,
            Self::Rotation(_) => FilterKind::Rotation,
            Self::Distortion(_) => FilterKind::Distortion,
            Self::ChannelMix(_) => FilterKind::ChannelMix,
            Self::LowPass(_) => FilterKind::LowPass,
        }
    }

    /// A flat equalizer with the given gain on every band.
    pub fn flat_equalizer(gain: f64) -> Self {
        Self::Equalizer((0..15).map(|band| EqualizerBand { band, gain }).collect())
    }

    fn apply_to(&self, payload: &mut FilterPayload) {
        match self {
            Self::Volume(v) => payload.volume = Some(*v),
            Self::Equalizer(bands) => payload.equalizer = Some(bands.clone()),
            Self::Karaoke(k) => payload.karaoke = Some(*k),
            Self::Timescale(t) => payload.timescale = Some(*t),
            Self::Tremolo(o) => payload.tremolo = Some(*o),
            Self::Vibrato(o) => payload.vibrato = Some(*o),
            Self::Rotation(r) => payload.rotation = Some(*r),
            Self::Distortion(d) => payload.distortion = Some(*d),
            Self::ChannelMix(c) => payload.channel_mix = Some(*c),
            Self::LowPass(l) => payload.low_pass = Some(*l),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedFilter {
    pub tag: String,
    /// Attached from a track; removed when the next track plays.
    pub preload: bool,
    pub filter: Filter,
}

impl TaggedFilter {
    pub fn new(tag: impl Into<String>, filter: Filter) -> Self {
        Self {
            tag: tag.into(),
            preload: false,
            filter,
        }
    }

    pub fn preload(tag: impl Into<String>, filter: Filter) -> Self {
        Self {
            tag: tag.into(),
            preload: true,
            filter,
        }
    }
}

/// Wire representation of the full filter state sent to a node.
///
/// Kinds that are not set are omitted, which the node treats as "off".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equalizer: Option<Vec<EqualizerBand>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub karaoke: Option<Karaoke>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timescale: Option<Timescale>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tremolo: Option<Oscillation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrato: Option<Oscillation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distortion: Option<Distortion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_mix: Option<ChannelMix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_pass: Option<LowPass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_filters: Option<serde_json::Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chain
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    filters: Vec<TaggedFilter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, filter: TaggedFilter) -> Result<()> {
        if self.get(&filter.tag).is_some() {
            return Err(Error::FilterTagInUse(filter.tag));
        }
        let kind = filter.filter.kind();
        if self.filters.iter().any(|f| f.filter.kind() == kind) {
            return Err(Error::FilterKindInUse(kind.as_str()));
        }
        self.filters.push(filter);
        Ok(())
    }

    pub fn remove(&mut self, tag: &str) -> Result<TaggedFilter> {
        let idx = self
            .filters
            .iter()
            .position(|f| f.tag == tag)
            .ok_or_else(|| Error::FilterTagInvalid(tag.to_owned()))?;
        Ok(self.filters.remove(idx))
    }

    /// Replace the settings under `tag`.  The kind may change as long as
    /// it does not collide with another tag's kind.
    pub fn edit(&mut self, tag: &str, filter: Filter) -> Result<()> {
        let kind = filter.kind();
        if self
            .filters
            .iter()
            .any(|f| f.tag != tag && f.filter.kind() == kind)
        {
            return Err(Error::FilterKindInUse(kind.as_str()));
        }
        let slot = self
            .filters
            .iter_mut()
            .find(|f| f.tag == tag)
            .ok_or_else(|| Error::FilterTagInvalid(tag.to_owned()))?;
        slot.filter = filter;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.filters.clear();
    }

    /// Drop every preload filter, returning how many were removed.
    pub fn remove_preload(&mut self) -> usize {
        let before = self.filters.len();
        self.filters.retain(|f| !f.preload);
        before - self.filters.len()
    }

    pub fn get(&self, tag: &str) -> Option<&TaggedFilter> {
        self.filters.iter().find(|f| f.tag == tag)
    }

    pub fn has_preload(&self) -> bool {
        self.filters.iter().any(|f| f.preload)
    }

    pub fn has_global(&self) -> bool {
        self.filters.iter().any(|f| !f.preload)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|f| f.tag.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaggedFilter> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn payload(&self) -> FilterPayload {
        let mut payload = FilterPayload::default();
        for f in &self.filters {
            f.filter.apply_to(&mut payload);
        }
        payload
    }

    /// Effective playback rate from an active timescale filter.
    pub fn rate(&self) -> f64 {
        self.filters
            .iter()
            .find_map(|f| match f.filter {
                Filter::Timescale(t) => Some(t.speed * t.rate),
                _ => None,
            })
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_and_kinds_are_unique() {
        let mut chain = FilterChain::new();
        chain
            .add(TaggedFilter::new("nc", Filter::Timescale(Timescale::nightcore())))
            .unwrap();

        let dup_tag = chain.add(TaggedFilter::new("nc", Filter::Rotation(Rotation::default())));
        assert!(matches!(dup_tag, Err(Error::FilterTagInUse(_))));

        let dup_kind = chain.add(TaggedFilter::new("vw", Filter::Timescale(Timescale::vaporwave())));
        assert!(matches!(dup_kind, Err(Error::FilterKindInUse("timescale"))));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn remove_and_edit_unknown_tag_fail() {
        let mut chain = FilterChain::new();
        assert!(matches!(chain.remove("x"), Err(Error::FilterTagInvalid(_))));
        assert!(matches!(
            chain.edit("x", Filter::Volume(1.0)),
            Err(Error::FilterTagInvalid(_))
        ));
    }

    #[test]
    fn edit_replaces_settings() {
        let mut chain = FilterChain::new();
        chain.add(TaggedFilter::new("v", Filter::Volume(1.0))).unwrap();
        chain.edit("v", Filter::Volume(2.0)).unwrap();
        assert_eq!(chain.payload().volume, Some(2.0));
    }

    #[test]
    fn preload_filters_are_removed_separately() {
        let mut chain = FilterChain::new();
        chain.add(TaggedFilter::new("bass", Filter::flat_equalizer(0.2))).unwrap();
        chain
            .add(TaggedFilter::preload("track-lp", Filter::LowPass(LowPass::default())))
            .unwrap();
        assert!(chain.has_preload());
        assert!(chain.has_global());

        assert_eq!(chain.remove_preload(), 1);
        assert!(!chain.has_preload());
        assert_eq!(chain.tags().collect::<Vec<_>>(), vec!["bass"]);
    }

    #[test]
    fn payload_omits_inactive_kinds() {
        let mut chain = FilterChain::new();
        chain
            .add(TaggedFilter::new("mix", Filter::ChannelMix(ChannelMix::mono())))
            .unwrap();
        let v = serde_json::to_value(chain.payload()).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(v["channelMix"]["leftToRight"], 0.5);
    }

    #[test]
    fn rate_follows_timescale() {
        let mut chain = FilterChain::new();
        assert_eq!(chain.rate(), 1.0);
        chain
            .add(TaggedFilter::new(
                "fast",
                Filter::Timescale(Timescale {
                    speed: 1.5,
                    pitch: 1.0,
                    rate: 1.0,
                }),
            ))
            .unwrap();
        assert_eq!(chain.rate(), 1.5);
    }
}
