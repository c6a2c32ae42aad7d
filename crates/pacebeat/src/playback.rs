//! Simulated playback through the runner's playlist.

use crate::{matcher::Track, playlist::Playlist};

#[derive(Debug, Clone, Default)]
pub struct PlaybackSimulator {
    playlist: Playlist,
    current: Option<Track>,
    position_secs: u32,
    playing: bool,
}

impl PlaybackSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cues the first track of `playlist`, paused.
    pub fn from_playlist(playlist: Playlist) -> Self {
        let current = playlist.first().cloned();
        Self {
            playlist,
            current,
            position_secs: 0,
            playing: false,
        }
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Loads a track at position zero. The play state is kept.
    pub fn load(&mut self, track: Track) {
        self.current = Some(track);
        self.position_secs = 0;
    }

    pub fn track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn position_secs(&self) -> u32 {
        self.position_secs
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self) {
        self.playing = self.current.is_some();
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Skips to the following playlist entry, wrapping at the end. A track
    /// loaded from outside the playlist skips to its first entry.
    pub fn next(&mut self) -> Option<&Track> {
        let next = match &self.current {
            Some(t) if self.playlist.contains(&t.id) => self.playlist.next_after(&t.id),
            _ => self.playlist.first(),
        }
        .cloned()?;
        self.load(next);
        self.track()
    }

    /// Skips to the preceding playlist entry, wrapping at the start.
    pub fn previous(&mut self) -> Option<&Track> {
        let previous = match &self.current {
            Some(t) if self.playlist.contains(&t.id) => self.playlist.previous_before(&t.id),
            _ => self.playlist.first(),
        }
        .cloned()?;
        self.load(previous);
        self.track()
    }

    /// Advances one second while playing. A finished track rolls over to the
    /// next playlist entry; with nothing to roll over to, playback stops at
    /// the end of the track.
    pub fn tick(&mut self) {
        if !self.playing {
            return;
        }
        let Some(track) = &self.current else {
            return;
        };
        self.position_secs = (self.position_secs + 1).min(track.duration_secs);

        if self.finished() {
            let finished_id = track.id.clone();
            if self.next().is_some() {
                tracing::debug!(
                    finished = %finished_id,
                    next = ?self.current.as_ref().map(|t| t.id.as_str()),
                    "Track rolled over"
                );
            } else {
                self.playing = false;
            }
        }
    }

    pub fn finished(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|t| self.position_secs >= t.duration_secs)
    }

    /// Fraction of the track played, in [0, 1].
    pub fn progress(&self) -> f64 {
        match &self.current {
            Some(t) if t.duration_secs > 0 => self.position_secs as f64 / t.duration_secs as f64,
            _ => 0.0,
        }
    }
}
