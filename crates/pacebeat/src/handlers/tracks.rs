//! Tempo matching handlers.

use std::sync::Arc;

use axum::{
    Extension,
    extract::Query,
    response::Json,
};
use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::{BearerToken, StaticToken},
    errors::AppError,
    handlers::pace::BpmQuery,
    matcher::{RankedTrack, Track, demo_mix, rank_annotated, rank_with_lookup},
    spotify::{DEFAULT_SEARCH_LIMIT, SpotifyClient, SpotifyTempo},
};

#[derive(Deserialize, ToSchema)]
pub struct RankTracksRequest {
    pub target_bpm: f64,
    pub tracks: Vec<Track>,
}

/// Rank a catalog by tempo proximity to the target.
///
/// Repeated ids keep their first occurrence; tracks without a tempo are dropped.
#[utoipa::path(
    post,
    path = "/tracks/rank",
    tag = "tracks",
    request_body = RankTracksRequest,
    responses(
        (status = 200, description = "Tracks, closest tempo first", body = Vec<RankedTrack>),
        (status = 400, description = "Invalid target BPM")
    )
)]
pub async fn rank_tracks(
    Json(req): Json<RankTracksRequest>,
) -> Result<Json<Vec<RankedTrack>>, AppError> {
    Ok(Json(rank_annotated(req.tracks, req.target_bpm)?))
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct SearchTracksRequest {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "Search query is required"))]
    pub query: String,
    /// When set, tempos are looked up and results ranked against it.
    #[serde(default)]
    pub target_bpm: Option<f64>,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_SEARCH_LIMIT
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(String::deserialize(deserializer)?.trim().to_string())
}

/// Search the upstream catalog, optionally ranking by tempo.
#[utoipa::path(
    post,
    path = "/tracks/search",
    tag = "tracks",
    request_body = SearchTracksRequest,
    responses(
        (status = 200, description = "Matching tracks", body = Vec<Track>),
        (status = 400, description = "Invalid query or target")
    )
)]
pub async fn search_tracks(
    Extension(client): Extension<SpotifyClient>,
    bearer: BearerToken,
    Json(req): Json<SearchTracksRequest>,
) -> Result<Json<Vec<Track>>, AppError> {
    req.validate()?;
    let token = bearer.resolve(req.access_token)?;

    let tracks = client.search_tracks(&token, &req.query, req.limit).await?;

    let Some(target_bpm) = req.target_bpm else {
        return Ok(Json(tracks));
    };
    if tracks.is_empty() {
        return Ok(Json(tracks));
    }

    let tempos = Arc::new(SpotifyTempo::new(client, Arc::new(StaticToken(token))));
    let ranked = rank_with_lookup(tempos, tracks, target_bpm).await?;
    tracing::info!(
        query = %req.query,
        target_bpm,
        ranked = ranked.len(),
        "Ranked search results"
    );
    Ok(Json(ranked))
}

/// A mock mix around the target cadence.
#[utoipa::path(
    get,
    path = "/tracks/demo",
    tag = "tracks",
    params(BpmQuery),
    responses(
        (status = 200, description = "Demo mix", body = Vec<RankedTrack>),
        (status = 400, description = "BPM outside 120..=200")
    )
)]
pub async fn demo_tracks(
    Query(params): Query<BpmQuery>,
) -> Result<Json<Vec<RankedTrack>>, AppError> {
    params.validate()?;
    let ranked = rank_annotated(demo_mix(params.bpm), params.bpm as f64)?;
    Ok(Json(ranked))
}
