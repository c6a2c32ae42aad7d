//! Tempo-based track selection.
//!
//! Tracks are ranked by the absolute distance between their tempo and the
//! runner's target cadence. Ranking is stable: tracks at the same distance
//! keep their catalog order.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinSet;
use utoipa::ToSchema;

use crate::pace::{MatchQuality, match_quality};

#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("Target BPM must be a non-negative number, got {0}")]
    InvalidTarget(f64),
}

/// A playable track and its measured tempo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Measured tempo in BPM. `None` until an audio analysis has been looked up.
    #[serde(default)]
    pub tempo: Option<f64>,
    /// Length in whole seconds.
    pub duration_secs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl Track {
    /// Tempo if it is known and usable for matching.
    pub fn known_tempo(&self) -> Option<f64> {
        self.tempo.filter(|t| t.is_finite() && *t > 0.0)
    }

    fn tempo_distance(&self, target_bpm: f64) -> Option<f64> {
        self.known_tempo().map(|t| (t - target_bpm).abs())
    }
}

/// A ranked track annotated with how well it fits the target.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankedTrack {
    #[serde(flatten)]
    pub track: Track,
    pub tempo_delta: f64,
    pub quality: MatchQuality,
}

fn check_target(target_bpm: f64) -> Result<(), MatchError> {
    if !target_bpm.is_finite() || target_bpm < 0.0 {
        return Err(MatchError::InvalidTarget(target_bpm));
    }
    Ok(())
}

/// Orders tracks by ascending tempo distance from the target.
///
/// Tracks with an unknown or zero tempo are dropped.
pub fn rank_by_tempo(tracks: Vec<Track>, target_bpm: f64) -> Result<Vec<Track>, MatchError> {
    check_target(target_bpm)?;

    let mut keyed: Vec<(f64, Track)> = tracks
        .into_iter()
        .filter_map(|t| t.tempo_distance(target_bpm).map(|d| (d, t)))
        .collect();
    // sort_by is stable
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    Ok(keyed.into_iter().map(|(_, t)| t).collect())
}

/// Keeps the first occurrence of every track id, preserving order.
pub fn dedupe_by_id(tracks: Vec<Track>) -> Vec<Track> {
    let mut seen = HashSet::new();
    tracks
        .into_iter()
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}

/// The single closest track. Earlier tracks win ties.
pub fn best_match(tracks: &[Track], target_bpm: f64) -> Option<&Track> {
    tracks
        .iter()
        .filter_map(|t| t.tempo_distance(target_bpm).map(|d| (d, t)))
        .reduce(|best, cur| if cur.0 < best.0 { cur } else { best })
        .map(|(_, t)| t)
}

/// Ranks and annotates tracks for display.
pub fn rank_annotated(tracks: Vec<Track>, target_bpm: f64) -> Result<Vec<RankedTrack>, MatchError> {
    let ranked = rank_by_tempo(dedupe_by_id(tracks), target_bpm)?;
    Ok(ranked
        .into_iter()
        .filter_map(|track| {
            let tempo = track.known_tempo()?;
            Some(RankedTrack {
                tempo_delta: (tempo - target_bpm).abs(),
                quality: match_quality(tempo, target_bpm),
                track,
            })
        })
        .collect())
}

/// Looks up the tempo of a single track.
#[async_trait]
pub trait TempoSource: Send + Sync {
    /// Returns `Ok(None)` when the track has no analysis available.
    async fn tempo(&self, track_id: &str) -> anyhow::Result<Option<f64>>;
}

/// Fills in tempos from `source` and ranks the result.
///
/// Lookups run concurrently and all of them are awaited before ranking. A
/// looked-up tempo replaces the supplied one. A failed lookup keeps the
/// supplied tempo, so only tracks with no tempo at all are dropped.
pub async fn rank_with_lookup(
    source: Arc<dyn TempoSource>,
    tracks: Vec<Track>,
    target_bpm: f64,
) -> Result<Vec<Track>, MatchError> {
    check_target(target_bpm)?;

    let mut lookups = JoinSet::new();
    for (idx, track) in tracks.iter().enumerate() {
        let source = source.clone();
        let id = track.id.clone();
        lookups.spawn(async move { (idx, id.clone(), source.tempo(&id).await) });
    }

    let mut tempos: Vec<Option<f64>> = tracks.iter().map(|t| t.tempo).collect();
    while let Some(joined) = lookups.join_next().await {
        match joined {
            Ok((idx, _, Ok(tempo))) => tempos[idx] = tempo.or(tempos[idx]),
            Ok((_, id, Err(e))) => {
                tracing::warn!("Tempo lookup failed for track {id}: {e}");
            }
            Err(e) => {
                tracing::error!("Tempo lookup task failed: {e}");
            }
        }
    }

    let filled = tracks
        .into_iter()
        .zip(tempos)
        .map(|(track, tempo)| Track { tempo, ..track })
        .collect();

    rank_by_tempo(filled, target_bpm)
}

/// A five-track mix clustered tightly around the target, used when no
/// upstream catalog is available.
pub fn demo_mix(target_bpm: u32) -> Vec<Track> {
    const MIX: [(&str, &str, &str, i32, u32); 5] = [
        ("Thunder Runner", "Electric Beats", "Power Pace", 0, 215),
        ("Pace Perfect", "Rhythm Masters", "Beat Sync", -2, 198),
        ("Sync Stream", "Beat Runners", "Flow State", 1, 187),
        ("Flow State", "Tempo Track", "Cadence", -1, 203),
        ("Power Stride", "Cadence Co", "Runner's High", 3, 234),
    ];

    MIX.iter()
        .enumerate()
        .map(|(i, (title, artist, album, offset, duration))| Track {
            id: format!("demo-{}", i + 1),
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            tempo: Some((target_bpm as i32 + offset).max(1) as f64),
            duration_secs: *duration,
            cover_url: None,
        })
        .collect()
}
