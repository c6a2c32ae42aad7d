//! Simulated run session handlers.

use axum::{
    Extension,
    extract::Path,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::AppError,
    matcher::Track,
    session::SyncSnapshot,
    sessions::SessionRegistry,
};

#[derive(Deserialize, ToSchema, Validate)]
pub struct StartSessionRequest {
    #[validate(range(min = 120, max = 200, message = "Target BPM must be between 120 and 200"))]
    pub target_bpm: u32,
    /// Playlist to simulate playback of during the run. Repeated ids are
    /// dropped.
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Reorder the playlist by tempo proximity to the target first.
    #[serde(default)]
    pub optimize: bool,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub snapshot: SyncSnapshot,
}

/// Start a simulated run.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session started", body = SessionResponse),
        (status = 400, description = "Target BPM out of range"),
        (status = 503, description = "Too many live sessions")
    )
)]
pub async fn start_session(
    Extension(registry): Extension<SessionRegistry>,
    Json(req): Json<StartSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    req.validate()?;
    let (id, snapshot) = registry
        .start(req.target_bpm, req.tracks, req.optimize)
        .await?;
    Ok(Json(SessionResponse { id, snapshot }))
}

/// Current metrics of a running session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Latest snapshot", body = SessionResponse),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    Extension(registry): Extension<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let snapshot = registry.snapshot(id).await?;
    Ok(Json(SessionResponse { id, snapshot }))
}

/// Pause a running session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/pause",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session paused", body = SessionResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session is not running")
    )
)]
pub async fn pause_session(
    Extension(registry): Extension<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let snapshot = registry.pause(id).await?;
    Ok(Json(SessionResponse { id, snapshot }))
}

/// Resume a paused session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/resume",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session resumed", body = SessionResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session is not paused")
    )
)]
pub async fn resume_session(
    Extension(registry): Extension<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let snapshot = registry.resume(id).await?;
    Ok(Json(SessionResponse { id, snapshot }))
}

/// Skip to the next playlist track, wrapping at the end.
#[utoipa::path(
    post,
    path = "/sessions/{id}/next",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Now playing the next track", body = SessionResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session has no playlist")
    )
)]
pub async fn next_track(
    Extension(registry): Extension<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let snapshot = registry.next_track(id).await?;
    Ok(Json(SessionResponse { id, snapshot }))
}

/// Skip to the previous playlist track, wrapping at the start.
#[utoipa::path(
    post,
    path = "/sessions/{id}/previous",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Now playing the previous track", body = SessionResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session has no playlist")
    )
)]
pub async fn previous_track(
    Extension(registry): Extension<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let snapshot = registry.previous_track(id).await?;
    Ok(Json(SessionResponse { id, snapshot }))
}

/// Stop a session and return its final metrics.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Final snapshot", body = SessionResponse),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn stop_session(
    Extension(registry): Extension<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = registry.stop(id).await?;
    Ok(Json(SessionResponse {
        id,
        snapshot: session.snapshot(),
    }))
}
