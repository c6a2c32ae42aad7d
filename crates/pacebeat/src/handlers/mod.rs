//! HTTP request handlers.
//!
//! This module re-exports handlers from focused submodules organized by domain.

pub mod health;
pub mod pace;
pub mod sessions;
pub mod spotify;
pub mod tracks;

// Re-export handlers from submodules (including utoipa __path types for OpenAPI)
pub use health::{__path_health_check, health_check};
pub use pace::{
    __path_bpm_to_pace, __path_list_presets, __path_pace_to_bpm, BpmQuery, PaceQuery,
    bpm_to_pace, list_presets, pace_to_bpm,
};
pub use sessions::{
    __path_get_session, __path_next_track, __path_pause_session, __path_previous_track,
    __path_resume_session, __path_start_session, __path_stop_session, SessionResponse,
    StartSessionRequest, get_session, next_track, pause_session, previous_track, resume_session,
    start_session, stop_session,
};
pub use spotify::{
    __path_exchange_token, __path_proxy_action, ProxyRequest, TokenExchangeRequest,
    exchange_token, proxy_action,
};
pub use tracks::{
    __path_demo_tracks, __path_rank_tracks, __path_search_tracks, RankTracksRequest,
    SearchTracksRequest, demo_tracks, rank_tracks, search_tracks,
};
