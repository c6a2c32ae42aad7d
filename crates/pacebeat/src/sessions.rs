//! Live session bookkeeping for the HTTP surface.
//!
//! Each entry owns its [`SessionRunner`]. Removing an entry stops the runner,
//! and dropping the registry aborts every remaining timer. Sessions nobody
//! has touched for the idle TTL are stopped by [`SessionRegistry::sweep`],
//! which runs before every start and periodically from the reaper task.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use uuid::Uuid;

use crate::{
    config::Config,
    errors::AppError,
    matcher::Track,
    playback::PlaybackSimulator,
    playlist::Playlist,
    session::{Session, SessionHandle, SessionRunner, SyncSnapshot},
};

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 100;
/// How often the reaper task sweeps idle sessions.
pub const REAP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    runner: SessionRunner,
    last_seen: Instant,
}

type Entries = Arc<Mutex<HashMap<Uuid, Entry>>>;

#[derive(Clone)]
pub struct SessionRegistry {
    entries: Entries,
    tick: Duration,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(tick: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            tick,
            idle_ttl: DEFAULT_IDLE_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.session_tick).with_limits(config.session_idle_ttl, config.max_sessions)
    }

    pub fn with_limits(mut self, idle_ttl: Duration, max_sessions: usize) -> Self {
        self.idle_ttl = idle_ttl;
        self.max_sessions = max_sessions;
        self
    }

    /// Starts a session. Any `tracks` become its playlist, deduplicated by id
    /// and, with `optimize`, ordered by tempo proximity to the target.
    pub async fn start(
        &self,
        target_bpm: u32,
        tracks: Vec<Track>,
        optimize: bool,
    ) -> Result<(Uuid, SyncSnapshot), AppError> {
        self.sweep().await;

        let mut playlist = Playlist::from_tracks(tracks);
        if optimize {
            playlist.optimize(target_bpm as f64)?;
        }
        let playback = (!playlist.is_empty()).then(|| PlaybackSimulator::from_playlist(playlist));

        let mut entries = self.entries.lock().await;
        if entries.len() >= self.max_sessions {
            tracing::warn!(live = entries.len(), "Session limit reached");
            return Err(AppError::TooManySessions(self.max_sessions));
        }

        let runner = SessionRunner::start(target_bpm, self.tick, playback)?;
        let snapshot = runner.snapshot();
        let id = Uuid::new_v4();
        entries.insert(
            id,
            Entry {
                runner,
                last_seen: Instant::now(),
            },
        );
        tracing::info!(session_id = %id, "Registered session");
        Ok((id, snapshot))
    }

    /// Handle to a live session. Counts as activity for the idle TTL.
    async fn touch(&self, id: Uuid) -> Result<SessionHandle, AppError> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&id).ok_or(AppError::NotFound)?;
        entry.last_seen = Instant::now();
        Ok(entry.runner.handle())
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<SyncSnapshot, AppError> {
        Ok(self.touch(id).await?.snapshot())
    }

    pub async fn pause(&self, id: Uuid) -> Result<SyncSnapshot, AppError> {
        Ok(self.touch(id).await?.pause().await?)
    }

    pub async fn resume(&self, id: Uuid) -> Result<SyncSnapshot, AppError> {
        Ok(self.touch(id).await?.resume().await?)
    }

    pub async fn next_track(&self, id: Uuid) -> Result<SyncSnapshot, AppError> {
        Ok(self.touch(id).await?.next_track().await?)
    }

    pub async fn previous_track(&self, id: Uuid) -> Result<SyncSnapshot, AppError> {
        Ok(self.touch(id).await?.previous_track().await?)
    }

    /// Stops and forgets a session, returning its final state.
    pub async fn stop(&self, id: Uuid) -> Result<Session, AppError> {
        let entry = self
            .entries
            .lock()
            .await
            .remove(&id)
            .ok_or(AppError::NotFound)?;
        Ok(entry.runner.stop().await?)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Stops every session idle for at least the TTL. Returns how many were
    /// stopped.
    pub async fn sweep(&self) -> usize {
        sweep(&self.entries, self.idle_ttl).await
    }

    /// Sweeps every `every` until the registry is dropped.
    pub fn spawn_reaper(&self, every: Duration) -> JoinHandle<()> {
        let entries: Weak<_> = Arc::downgrade(&self.entries);
        let idle_ttl = self.idle_ttl;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let reaped = sweep(&entries, idle_ttl).await;
                if reaped > 0 {
                    tracing::info!(reaped, "Reaped idle sessions");
                }
            }
        })
    }
}

async fn sweep(entries: &Entries, idle_ttl: Duration) -> usize {
    let now = Instant::now();
    let expired: Vec<(Uuid, Entry)> = {
        let mut entries = entries.lock().await;
        let ids: Vec<Uuid> = entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_seen) >= idle_ttl)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| entries.remove(&id).map(|e| (id, e)))
            .collect()
    };

    let count = expired.len();
    for (id, entry) in expired {
        match entry.runner.stop().await {
            Ok(session) => tracing::info!(
                session_id = %id,
                elapsed_secs = session.elapsed_secs(),
                "Stopped idle session"
            ),
            Err(e) => tracing::warn!(session_id = %id, "Idle session already gone: {e}"),
        }
    }
    count
}
