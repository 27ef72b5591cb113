//! `tl-queue`: playback-order queue for a player.
//!
//! The queue keeps a cursor on the *current* track (by identity, so it
//! survives inserts, moves and shuffles) and advances it according to the
//! [`LoopMode`].  With `strict` off, every failure becomes a silent no-op
//! returning `Ok(None)` / `Ok(())`.

use rand::seq::SliceRandom;
use tl_domain::error::{Error, Result};
use tl_domain::track::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    /// Repeat the current track.
    Track,
    /// Wrap around to the first track after the last.
    Queue,
}

#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub max_size: Option<usize>,
    /// When full, drop from the tail to make room instead of rejecting.
    pub overflow: bool,
    /// Return errors instead of `Ok(None)` / `Ok(())`.
    pub strict: bool,
    /// Running off the end with looping disabled is not an error.
    pub loose_mode: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            max_size: None,
            overflow: true,
            strict: true,
            loose_mode: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Queue {
    items: Vec<Track>,
    current: Option<Track>,
    primary: Option<Track>,
    loop_mode: LoopMode,
    options: QueueOptions,
}

impl Queue {
    pub fn new(options: QueueOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self::new(QueueOptions {
            max_size: Some(max_size),
            ..Default::default()
        })
    }

    // ── failure helpers ──────────────────────────────────────────────

    fn fail<T>(&self, err: Error) -> Result<Option<T>> {
        if self.options.strict {
            Err(err)
        } else {
            Ok(None)
        }
    }

    fn fail_unit(&self, err: Error) -> Result<()> {
        if self.options.strict {
            Err(err)
        } else {
            Ok(())
        }
    }

    fn full_error(&self) -> Error {
        Error::QueueFull {
            max_size: self.options.max_size.unwrap_or(usize::MAX),
        }
    }

    /// Free up space for `incoming` new items.  Returns `false` when the
    /// queue is bounded, full, and not allowed to overflow.
    ///
    /// Items are dropped from the tail, skipping the current track so the
    /// cursor survives; it only goes when nothing else is left to drop.
    fn make_room(&mut self, incoming: usize) -> bool {
        let Some(max) = self.options.max_size else {
            return true;
        };
        let excess = (self.items.len() + incoming).saturating_sub(max);
        if excess == 0 {
            return true;
        }
        if !self.options.overflow {
            return false;
        }

        let current = self.position_of_current();
        let mut dropped = 0;
        let mut idx = self.items.len();
        while dropped < excess && idx > 0 {
            idx -= 1;
            if Some(idx) == current {
                continue;
            }
            self.items.remove(idx);
            dropped += 1;
        }
        if dropped < excess {
            self.items.clear();
            self.current = None;
            dropped += 1;
        }
        tracing::debug!(dropped, max_size = max, "queue overflow, dropped tail items");
        true
    }

    fn position_of_current(&self) -> Option<usize> {
        let current = self.current.as_ref()?;
        self.find_position(current)
    }

    fn remove_index(&mut self, index: usize) -> Track {
        let removed = self.items.remove(index);
        if self.current.as_ref() == Some(&removed) {
            self.current = index
                .checked_sub(1)
                .and_then(|prev| self.items.get(prev))
                .cloned();
        }
        removed
    }

    // ── inspection ───────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.options
            .max_size
            .is_some_and(|max| self.items.len() >= max)
    }

    pub fn max_size(&self) -> Option<usize> {
        self.options.max_size
    }

    pub fn loose_mode(&self) -> bool {
        self.options.loose_mode
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn get_at(&self, index: usize) -> Option<&Track> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.items.iter()
    }

    pub fn find_position(&self, track: &Track) -> Option<usize> {
        self.items.iter().position(|t| t == track)
    }

    pub fn contains(&self, track: &Track) -> bool {
        self.find_position(track).is_some()
    }

    // ── loop mode / primary ──────────────────────────────────────────

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    pub fn is_looping(&self) -> bool {
        self.loop_mode != LoopMode::Off
    }

    pub fn primary(&self) -> Option<&Track> {
        self.primary.as_ref()
    }

    /// Mark a track to be handed out by the next [`get`](Self::get),
    /// ahead of the queue order.
    pub fn set_primary(&mut self, track: Track) {
        self.primary = Some(track);
    }

    pub fn clear_primary(&mut self) -> Option<Track> {
        self.primary.take()
    }

    // ── insertion ────────────────────────────────────────────────────

    pub fn put(&mut self, track: Track) -> Result<()> {
        if !self.make_room(1) {
            return self.fail_unit(self.full_error());
        }
        self.items.push(track);
        Ok(())
    }

    /// Insert at `index`, clamped to the end of the queue.
    pub fn put_at_index(&mut self, index: usize, track: Track) -> Result<()> {
        if !self.make_room(1) {
            return self.fail_unit(self.full_error());
        }
        let index = index.min(self.items.len());
        self.items.insert(index, track);
        Ok(())
    }

    pub fn put_at_front(&mut self, track: Track) -> Result<()> {
        self.put_at_index(0, track)
    }

    pub fn put_list(&mut self, tracks: Vec<Track>) -> Result<()> {
        if !self.make_room(tracks.len()) {
            return self.fail_unit(self.full_error());
        }
        self.items.extend(tracks);
        if let Some(max) = self.options.max_size {
            self.items.truncate(max);
        }
        Ok(())
    }

    /// Append every track.  With `atomic`, a bounded queue that cannot
    /// overflow rejects the whole batch up front; otherwise as many tracks
    /// as fit are added.
    pub fn extend_tracks(
        &mut self,
        tracks: impl IntoIterator<Item = Track>,
        atomic: bool,
    ) -> Result<()> {
        let tracks: Vec<Track> = tracks.into_iter().collect();
        if atomic && !self.options.overflow {
            if let Some(max) = self.options.max_size {
                if self.items.len() + tracks.len() > max {
                    return self.fail_unit(self.full_error());
                }
            }
        }
        for track in tracks {
            if !self.make_room(1) {
                break;
            }
            self.items.push(track);
        }
        Ok(())
    }

    // ── cursor ───────────────────────────────────────────────────────

    /// Advance to the next track.
    pub fn next(&mut self) -> Result<Option<Track>> {
        if self.items.is_empty() {
            return self.fail(Error::QueueEmpty);
        }
        if self.loop_mode == LoopMode::Track {
            if let Some(current) = &self.current {
                return Ok(Some(current.clone()));
            }
        }

        let next = match self.position_of_current() {
            Some(idx) => idx + 1,
            None => 0,
        };

        let next = if next < self.items.len() {
            next
        } else if self.loop_mode == LoopMode::Queue {
            0
        } else if self.options.loose_mode {
            return Ok(None);
        } else {
            return self.fail(Error::QueueEmpty);
        };

        self.current = Some(self.items[next].clone());
        Ok(self.current.clone())
    }

    /// Like [`next`](Self::next), but a primary track is handed out first.
    pub fn get(&mut self) -> Result<Option<Track>> {
        if let Some(primary) = self.primary.take() {
            self.current = Some(primary.clone());
            return Ok(Some(primary));
        }
        self.next()
    }

    pub fn prev(&mut self) -> Result<Option<Track>> {
        if self.items.is_empty() {
            return self.fail(Error::QueueEmpty);
        }
        match self.position_of_current() {
            None => self.current = Some(self.items[0].clone()),
            Some(0) => return Ok(None),
            Some(idx) => self.current = Some(self.items[idx - 1].clone()),
        }
        Ok(self.current.clone())
    }

    pub fn jump(&mut self, track: &Track) -> Result<Option<Track>> {
        match self.find_position(track) {
            Some(idx) => self.jump_to(idx),
            None if self.loop_mode == LoopMode::Track => self.fail(Error::QueueLoopingTrack),
            None => self.fail(Error::QueueItemNotFound),
        }
    }

    pub fn jump_to(&mut self, index: usize) -> Result<Option<Track>> {
        if self.loop_mode == LoopMode::Track {
            return self.fail(Error::QueueLoopingTrack);
        }
        let Some(track) = self.items.get(index) else {
            return self.fail(Error::QueueItemNotFound);
        };
        self.current = Some(track.clone());
        Ok(self.current.clone())
    }

    // ── removal / reorder ────────────────────────────────────────────

    /// Remove and return the item at `index`, or the last item when `None`.
    pub fn pop(&mut self, index: Option<usize>) -> Result<Option<Track>> {
        if self.items.is_empty() {
            return self.fail(Error::QueueEmpty);
        }
        let index = index.unwrap_or(self.items.len() - 1);
        if index >= self.items.len() {
            return self.fail(Error::QueueItemNotFound);
        }
        Ok(Some(self.remove_index(index)))
    }

    pub fn remove(&mut self, track: &Track) -> Result<()> {
        match self.find_position(track) {
            Some(idx) => {
                self.remove_index(idx);
                Ok(())
            }
            None => self.fail_unit(Error::QueueItemNotFound),
        }
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Option<Track>> {
        if index >= self.items.len() {
            return self.fail(Error::QueueItemNotFound);
        }
        Ok(Some(self.remove_index(index)))
    }

    /// Move `track` to `index` (clamped to the end).
    pub fn move_item(&mut self, track: &Track, index: usize) -> Result<()> {
        if self.items.is_empty() {
            return self.fail_unit(Error::QueueEmpty);
        }
        let Some(from) = self.find_position(track) else {
            return self.fail_unit(Error::QueueItemNotFound);
        };
        let item = self.items.remove(from);
        let index = index.min(self.items.len());
        self.items.insert(index, item);
        Ok(())
    }

    /// Shuffle the queue, keeping the current track first.
    pub fn shuffle(&mut self) {
        self.items.shuffle(&mut rand::rng());
        if let Some(idx) = self.position_of_current() {
            let current = self.items.remove(idx);
            self.items.insert(0, current);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
    }

    /// Strip per-track filters from every queued track.
    pub fn clear_track_filters(&mut self) {
        for track in &mut self.items {
            track.filters.clear();
        }
        if let Some(current) = &mut self.current {
            current.filters.clear();
        }
    }
}

impl Extend<Track> for Queue {
    fn extend<I: IntoIterator<Item = Track>>(&mut self, iter: I) {
        // Non-atomic: adds as many as fit and never errors.
        let _ = self.extend_tracks(iter, false);
    }
}

impl<'a> IntoIterator for &'a Queue {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for Queue {
    type Item = Track;
    type IntoIter = std::vec::IntoIter<Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
