pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod matcher;
pub mod pace;
pub mod playback;
pub mod playlist;
pub mod request_id;
pub mod session;
pub mod sessions;
pub mod spotify;

use axum::{
    Extension, Json, Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};
use utoipa::OpenApi;

use crate::{
    config::Config,
    handlers::{
        bpm_to_pace, demo_tracks, exchange_token, get_session, health_check, list_presets,
        next_track, pace_to_bpm, pause_session, previous_track, proxy_action, rank_tracks,
        resume_session, search_tracks, start_session, stop_session,
    },
    request_id::request_id_middleware,
    sessions::{REAP_INTERVAL, SessionRegistry},
    spotify::SpotifyClient,
};

#[derive(OpenApi)]
#[openapi(
    info(title = "pacebeat", description = "Cadence-matched music for runners"),
    paths(
        handlers::health_check,
        handlers::pace_to_bpm,
        handlers::bpm_to_pace,
        handlers::list_presets,
        handlers::rank_tracks,
        handlers::search_tracks,
        handlers::demo_tracks,
        handlers::start_session,
        handlers::get_session,
        handlers::pause_session,
        handlers::resume_session,
        handlers::next_track,
        handlers::previous_track,
        handlers::stop_session,
        handlers::exchange_token,
        handlers::proxy_action,
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(config: &Config) -> Router {
    router_with(
        SpotifyClient::new(config.spotify.clone()),
        SessionRegistry::from_config(config),
    )
}

pub fn router_with(client: SpotifyClient, sessions: SessionRegistry) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_json))
        // Pace conversion
        .route("/pace/to-bpm", get(pace_to_bpm))
        .route("/pace/from-bpm", get(bpm_to_pace))
        .route("/pace/presets", get(list_presets))
        // Tempo matching
        .route("/tracks/rank", post(rank_tracks))
        .route("/tracks/search", post(search_tracks))
        .route("/tracks/demo", get(demo_tracks))
        // Simulated runs
        .route("/sessions", post(start_session))
        .route("/sessions/{id}", get(get_session).delete(stop_session))
        .route("/sessions/{id}/pause", post(pause_session))
        .route("/sessions/{id}/resume", post(resume_session))
        .route("/sessions/{id}/next", post(next_track))
        .route("/sessions/{id}/previous", post(previous_track))
        // Upstream proxy
        .route("/spotify/auth", post(exchange_token))
        .route("/spotify/api", post(proxy_action))
        .layer(Extension(client))
        .layer(Extension(sessions))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let sessions = SessionRegistry::from_config(&config);
    let _reaper = sessions.spawn_reaper(REAP_INTERVAL);
    let app = router_with(SpotifyClient::new(config.spotify.clone()), sessions);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tracing::info!("Server running on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
