//! Pace and cadence conversion handlers.

use axum::{extract::Query, response::Json};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    errors::AppError,
    pace::{PRESETS, Pace, PacePreset, TargetPace},
};

#[derive(Deserialize, ToSchema, IntoParams)]
pub struct PaceQuery {
    /// Pace per mile, "m:ss" or "m".
    pub pace: String,
}

#[derive(Deserialize, ToSchema, IntoParams, Validate)]
pub struct BpmQuery {
    #[validate(range(min = 120, max = 200, message = "BPM must be between 120 and 200"))]
    pub bpm: u32,
}

/// Convert a pace into a target cadence.
#[utoipa::path(
    get,
    path = "/pace/to-bpm",
    tag = "pace",
    params(PaceQuery),
    responses(
        (status = 200, description = "Target cadence for the pace", body = TargetPace),
        (status = 400, description = "Malformed or zero pace")
    )
)]
pub async fn pace_to_bpm(Query(params): Query<PaceQuery>) -> Result<Json<TargetPace>, AppError> {
    let pace: Pace = params.pace.parse()?;
    Ok(Json(TargetPace::from_pace(pace)))
}

/// Convert a target cadence into the pace that produces it.
#[utoipa::path(
    get,
    path = "/pace/from-bpm",
    tag = "pace",
    params(BpmQuery),
    responses(
        (status = 200, description = "Pace for the cadence", body = TargetPace),
        (status = 400, description = "BPM outside 120..=200")
    )
)]
pub async fn bpm_to_pace(Query(params): Query<BpmQuery>) -> Result<Json<TargetPace>, AppError> {
    params.validate()?;
    Ok(Json(TargetPace::from_bpm(params.bpm)?))
}

/// Quick-select pace presets.
#[utoipa::path(
    get,
    path = "/pace/presets",
    tag = "pace",
    responses(
        (status = 200, description = "Preset paces", body = Vec<PacePreset>)
    )
)]
pub async fn list_presets() -> Json<Vec<PacePreset>> {
    Json(PRESETS.to_vec())
}
