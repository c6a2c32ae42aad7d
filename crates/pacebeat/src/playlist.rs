//! The runner's editable playlist.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::matcher::{MatchError, Track, dedupe_by_id, rank_by_tempo};

#[derive(Debug, Error, PartialEq)]
pub enum PlaylistError {
    #[error("Track {0} is already in the playlist")]
    AlreadyPresent(String),

    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Ordered tracks in intended playback order. Ids are unique.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a playlist from arbitrary tracks, dropping repeated ids.
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks: dedupe_by_id(tracks),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.position(id).map(|i| &self.tracks[i])
    }

    pub fn first(&self) -> Option<&Track> {
        self.tracks.first()
    }

    /// Appends a track. Adding an id twice is rejected.
    pub fn add(&mut self, track: Track) -> Result<(), PlaylistError> {
        if self.contains(&track.id) {
            return Err(PlaylistError::AlreadyPresent(track.id));
        }
        self.tracks.push(track);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Track> {
        self.position(id).map(|i| self.tracks.remove(i))
    }

    pub fn replace_all(&mut self, tracks: Vec<Track>) {
        self.tracks = dedupe_by_id(tracks);
    }

    /// Track after `id`, wrapping to the start.
    pub fn next_after(&self, id: &str) -> Option<&Track> {
        let i = self.position(id)?;
        self.tracks.get((i + 1) % self.tracks.len())
    }

    /// Track before `id`, wrapping to the end.
    pub fn previous_before(&self, id: &str) -> Option<&Track> {
        let i = self.position(id)?;
        let prev = if i == 0 { self.tracks.len() - 1 } else { i - 1 };
        self.tracks.get(prev)
    }

    pub fn total_duration_minutes(&self) -> u64 {
        let total: u64 = self.tracks.iter().map(|t| t.duration_secs as u64).sum();
        total / 60
    }

    /// Reorders by tempo proximity to `target_bpm`. Tracks without a known
    /// tempo are removed.
    pub fn optimize(&mut self, target_bpm: f64) -> Result<(), PlaylistError> {
        let tracks = std::mem::take(&mut self.tracks);
        match rank_by_tempo(tracks.clone(), target_bpm) {
            Ok(ranked) => {
                self.tracks = ranked;
                Ok(())
            }
            Err(e) => {
                self.tracks = tracks;
                Err(e.into())
            }
        }
    }
}
