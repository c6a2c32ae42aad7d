//! Simulated running session.
//!
//! [`Session`] is the state machine and metrics model. It is advanced one
//! simulated second per [`Session::tick`]. [`SessionRunner`] owns a session
//! on a tokio task and drives it from a recurring timer.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Uniform};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use utoipa::ToSchema;

use crate::{
    matcher::Track,
    pace::{MAX_BPM, MIN_BPM, MatchQuality, Pace, format_clock, match_quality, speed_for_bpm},
    playback::PlaybackSimulator,
};

/// Largest step the simulated cadence drifts from target, either way.
const CADENCE_JITTER: i32 = 3;
/// Bounds on the per-second speed multiplier.
const PACE_VARIANCE: (f64, f64) = (0.95, 1.05);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Cannot {action} a session that is {from:?}")]
    InvalidTransition {
        action: &'static str,
        from: SessionStatus,
    },

    #[error("Session has already ended")]
    Ended,

    #[error("Session has no playlist")]
    NoPlaylist,
}

/// Point-in-time view of a session, published after every tick.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SyncSnapshot {
    pub status: SessionStatus,
    pub target_bpm: u32,
    pub cadence: u32,
    pub elapsed_secs: u64,
    /// Elapsed time formatted as `m:ss` or `h:mm:ss`.
    pub elapsed: String,
    pub distance_miles: f64,
    /// Average pace so far, `m:ss` per mile.
    pub pace: String,
    pub sync: MatchQuality,
    /// Id of the track playing alongside the run.
    pub track_id: Option<String>,
    /// Playback position of the current track, if a player is attached.
    pub track_position_secs: Option<u32>,
    /// Whole minutes of music queued in the playlist.
    pub playlist_minutes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Session {
    target_bpm: u32,
    status: SessionStatus,
    ended: bool,
    elapsed_secs: u64,
    distance_miles: f64,
    cadence: u32,
    jitter: Uniform<i32>,
    variance: Uniform<f64>,
}

impl Session {
    pub fn new(target_bpm: u32) -> Self {
        Self {
            target_bpm,
            status: SessionStatus::Idle,
            ended: false,
            elapsed_secs: 0,
            distance_miles: 0.0,
            cadence: target_bpm,
            jitter: Uniform::new_inclusive(-CADENCE_JITTER, CADENCE_JITTER),
            variance: Uniform::new_inclusive(PACE_VARIANCE.0, PACE_VARIANCE.1),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn target_bpm(&self) -> u32 {
        self.target_bpm
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn distance_miles(&self) -> f64 {
        self.distance_miles
    }

    pub fn cadence(&self) -> u32 {
        self.cadence
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.ended {
            return Err(SessionError::Ended);
        }
        if self.status != SessionStatus::Idle {
            return Err(SessionError::InvalidTransition {
                action: "start",
                from: self.status,
            });
        }
        self.status = SessionStatus::Running;
        self.elapsed_secs = 0;
        self.distance_miles = 0.0;
        self.cadence = self.target_bpm;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.transition("pause", SessionStatus::Running, SessionStatus::Paused)
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.transition("resume", SessionStatus::Paused, SessionStatus::Running)
    }

    /// Ends the session from any state. A stopped session cannot restart.
    pub fn stop(&mut self) {
        self.status = SessionStatus::Idle;
        self.ended = true;
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<(), SessionError> {
        if self.ended {
            return Err(SessionError::Ended);
        }
        if self.status != from {
            return Err(SessionError::InvalidTransition {
                action,
                from: self.status,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Advances the run by one simulated second. Returns false (and changes
    /// nothing) unless the session is running.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.status != SessionStatus::Running {
            return false;
        }

        self.elapsed_secs += 1;

        let drifted = self.target_bpm as i32 + self.jitter.sample(rng);
        self.cadence = drifted.clamp(MIN_BPM as i32, MAX_BPM as i32) as u32;

        let miles_per_sec = speed_for_bpm(self.target_bpm as f64) / 3600.0;
        self.distance_miles += miles_per_sec * self.variance.sample(rng);

        true
    }

    /// Average pace so far as `m:ss` per mile; "0:00" before any distance.
    pub fn current_pace(&self) -> String {
        if self.distance_miles <= 0.0 {
            return "0:00".to_string();
        }
        let minutes_per_mile = self.elapsed_secs as f64 / 60.0 / self.distance_miles;
        Pace::from_total_minutes(minutes_per_mile).to_string()
    }

    pub fn sync_quality(&self) -> MatchQuality {
        match_quality(self.cadence as f64, self.target_bpm as f64)
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            status: self.status,
            target_bpm: self.target_bpm,
            cadence: self.cadence,
            elapsed_secs: self.elapsed_secs,
            elapsed: format_clock(self.elapsed_secs),
            distance_miles: self.distance_miles,
            pace: self.current_pace(),
            sync: self.sync_quality(),
            track_id: None,
            track_position_secs: None,
            playlist_minutes: None,
        }
    }
}

type Reply = oneshot::Sender<Result<SyncSnapshot, SessionError>>;

enum SessionCommand {
    Pause(Reply),
    Resume(Reply),
    NextTrack(Reply),
    PreviousTrack(Reply),
    Stop,
}

/// Cloneable access to a running session's commands and snapshots.
///
/// A handle does not keep the session alive: once its [`SessionRunner`] is
/// stopped or dropped, every request answers [`SessionError::Ended`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    snapshots: watch::Receiver<SyncSnapshot>,
}

impl SessionHandle {
    /// Latest published state.
    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshots.clone()
    }

    pub async fn pause(&self) -> Result<SyncSnapshot, SessionError> {
        self.request(SessionCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<SyncSnapshot, SessionError> {
        self.request(SessionCommand::Resume).await
    }

    /// Skips playback to the next playlist track.
    pub async fn next_track(&self) -> Result<SyncSnapshot, SessionError> {
        self.request(SessionCommand::NextTrack).await
    }

    /// Skips playback to the previous playlist track.
    pub async fn previous_track(&self) -> Result<SyncSnapshot, SessionError> {
        self.request(SessionCommand::PreviousTrack).await
    }

    async fn request(&self, make: fn(Reply) -> SessionCommand) -> Result<SyncSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| SessionError::Ended)?;
        rx.await.map_err(|_| SessionError::Ended)?
    }
}

/// A running session ticking on its own task.
///
/// The timer task is the only writer. Observers read copies through
/// [`SessionRunner::subscribe`]. The task is cancelled by [`stop`], and
/// dropping the runner aborts it.
///
/// [`stop`]: SessionRunner::stop
pub struct SessionRunner {
    handle: SessionHandle,
    task: Option<JoinHandle<Session>>,
}

impl SessionRunner {
    /// Starts a new session ticking every `period`.
    pub fn start(
        target_bpm: u32,
        period: Duration,
        playback: Option<PlaybackSimulator>,
    ) -> Result<Self, SessionError> {
        Self::start_with_rng(target_bpm, period, playback, StdRng::from_entropy())
    }

    pub fn start_with_rng(
        target_bpm: u32,
        period: Duration,
        mut playback: Option<PlaybackSimulator>,
        mut rng: StdRng,
    ) -> Result<Self, SessionError> {
        let mut session = Session::new(target_bpm);
        session.start()?;
        if let Some(player) = playback.as_mut() {
            player.play();
        }

        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (snap_tx, snap_rx) = watch::channel(observe(&session, playback.as_ref()));

        tracing::info!(target_bpm, period_ms = period.as_millis() as u64, "Session started");

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if session.tick(&mut rng)
                            && let Some(player) = playback.as_mut()
                        {
                            player.tick();
                        }
                        snap_tx.send_replace(observe(&session, playback.as_ref()));
                    }
                    cmd = cmd_rx.recv() => match cmd {
                        Some(SessionCommand::Pause(reply)) => {
                            let result = session.pause().map(|_| {
                                if let Some(player) = playback.as_mut() {
                                    player.pause();
                                }
                                observe(&session, playback.as_ref())
                            });
                            snap_tx.send_replace(observe(&session, playback.as_ref()));
                            let _ = reply.send(result);
                        }
                        Some(SessionCommand::Resume(reply)) => {
                            let result = session.resume().map(|_| {
                                if let Some(player) = playback.as_mut() {
                                    player.play();
                                }
                                observe(&session, playback.as_ref())
                            });
                            snap_tx.send_replace(observe(&session, playback.as_ref()));
                            let _ = reply.send(result);
                        }
                        Some(SessionCommand::NextTrack(reply)) => {
                            let result = skip(&session, playback.as_mut(), PlaybackSimulator::next);
                            snap_tx.send_replace(observe(&session, playback.as_ref()));
                            let _ = reply.send(result);
                        }
                        Some(SessionCommand::PreviousTrack(reply)) => {
                            let result =
                                skip(&session, playback.as_mut(), PlaybackSimulator::previous);
                            snap_tx.send_replace(observe(&session, playback.as_ref()));
                            let _ = reply.send(result);
                        }
                        // A closed channel means every handle is gone
                        Some(SessionCommand::Stop) | None => break,
                    }
                }
            }

            session.stop();
            snap_tx.send_replace(observe(&session, playback.as_ref()));
            tracing::info!(
                elapsed_secs = session.elapsed_secs(),
                distance_miles = session.distance_miles(),
                "Session stopped"
            );
            session
        });

        Ok(Self {
            handle: SessionHandle {
                commands: cmd_tx,
                snapshots: snap_rx,
            },
            task: Some(task),
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.handle.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.handle.subscribe()
    }

    pub async fn pause(&self) -> Result<SyncSnapshot, SessionError> {
        self.handle.pause().await
    }

    pub async fn resume(&self) -> Result<SyncSnapshot, SessionError> {
        self.handle.resume().await
    }

    pub async fn next_track(&self) -> Result<SyncSnapshot, SessionError> {
        self.handle.next_track().await
    }

    pub async fn previous_track(&self) -> Result<SyncSnapshot, SessionError> {
        self.handle.previous_track().await
    }

    /// Stops the timer and returns the final session state.
    pub async fn stop(mut self) -> Result<Session, SessionError> {
        let Some(task) = self.task.take() else {
            return Err(SessionError::Ended);
        };
        // The task may already be gone if it panicked
        let _ = self.handle.commands.send(SessionCommand::Stop);
        task.await.map_err(|e| {
            tracing::error!("Session task failed: {e}");
            SessionError::Ended
        })
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn observe(session: &Session, playback: Option<&PlaybackSimulator>) -> SyncSnapshot {
    SyncSnapshot {
        track_id: playback.and_then(|p| p.track()).map(|t| t.id.clone()),
        track_position_secs: playback.map(|p| p.position_secs()),
        playlist_minutes: playback.map(|p| p.playlist().total_duration_minutes()),
        ..session.snapshot()
    }
}

fn skip(
    session: &Session,
    playback: Option<&mut PlaybackSimulator>,
    step: for<'a> fn(&'a mut PlaybackSimulator) -> Option<&'a Track>,
) -> Result<SyncSnapshot, SessionError> {
    if session.is_ended() {
        return Err(SessionError::Ended);
    }
    let player = playback.ok_or(SessionError::NoPlaylist)?;
    step(&mut *player).ok_or(SessionError::NoPlaylist)?;
    Ok(observe(session, Some(&*player)))
}
