//! End-to-end tests for the HTTP surface.
//!
//! Requests go through the full router, middleware included. Upstream calls
//! hit a small fake music API bound to a random local port.

use std::time::Duration;

use axum::{
    Form, Json, Router,
    body::{Body, to_bytes},
    extract::{Path, Query},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use pacebeat::{
    config::Config,
    create_router, router_with,
    sessions::SessionRegistry,
    spotify::{SpotifyClient, SpotifyConfig},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use tower::ServiceExt;

const TOKEN: &str = "good-token";

async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"status": 401, "message": "Invalid access token"}})),
    )
        .into_response()
}

fn search_item(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "artists": [{"name": "Test Artist"}],
        "album": {"name": "Test Album", "images": [{"url": format!("http://img/{id}")}]},
        "duration_ms": 200_000
    })
}

fn fake_upstream() -> Router {
    async fn token(headers: HeaderMap, Form(form): Form<HashMap<String, String>>) -> Response {
        let basic = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let grant = form.get("grant_type").map(String::as_str);
        if !basic.starts_with("Basic ") || grant != Some("authorization_code") {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_client"})))
                .into_response();
        }
        if form.get("code").map(String::as_str) != Some("good-code") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid authorization code"
                })),
            )
                .into_response();
        }
        Json(json!({
            "access_token": TOKEN,
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "refresh"
        }))
        .into_response()
    }

    async fn search(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
        if !authorized(&headers) {
            return unauthorized();
        }
        assert_eq!(q.get("type").map(String::as_str), Some("track"));
        Json(json!({
            "tracks": {
                "items": [
                    search_item("slow", "Slow Jam"),
                    search_item("broken", "No Analysis"),
                    search_item("close", "Right On"),
                    search_item("fast", "Sprint"),
                ]
            }
        }))
        .into_response()
    }

    async fn features(headers: HeaderMap, Path(id): Path<String>) -> Response {
        if !authorized(&headers) {
            return unauthorized();
        }
        match id.as_str() {
            "slow" => Json(json!({"id": id, "tempo": 150.2})).into_response(),
            "close" => Json(json!({"id": id, "tempo": 178.9})).into_response(),
            "fast" => Json(json!({"id": id, "tempo": 188.0})).into_response(),
            _ => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"status": 404, "message": "analysis not found"}})),
            )
                .into_response(),
        }
    }

    async fn play(headers: HeaderMap) -> StatusCode {
        if authorized(&headers) {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::UNAUTHORIZED
        }
    }

    async fn pause() -> StatusCode {
        StatusCode::FORBIDDEN
    }

    async fn current(headers: HeaderMap) -> Response {
        if !authorized(&headers) {
            return unauthorized();
        }
        Json(json!({"is_playing": true, "item": {"id": "close", "name": "Right On"}}))
            .into_response()
    }

    Router::new()
        .route("/api/token", post(token))
        .route("/v1/search", get(search))
        .route("/v1/audio-features/{id}", get(features))
        .route("/v1/me/player/play", put(play))
        .route("/v1/me/player/pause", put(pause))
        .route("/v1/me/player/next", post(play))
        .route("/v1/me/player/currently-playing", get(current))
}

/// Router wired to a freshly spawned fake upstream.
async fn app_with_upstream() -> Router {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, fake_upstream()).await.unwrap();
    });

    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    let client = SpotifyClient::with_http(
        http,
        SpotifyConfig {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            api_base: base.clone(),
            accounts_base: base,
        },
    );
    router_with(client, SessionRegistry::new(Duration::from_millis(20)))
}

fn app() -> Router {
    create_router(&Config::default())
}

#[tokio::test]
async fn test_health_and_headers() {
    let (status, headers, body) = send(app(), get_req("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "run-42")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(app(), request).await;
    assert_eq!(headers["x-request-id"], "run-42");
}

#[tokio::test]
async fn test_openapi_document() {
    let (status, _, body) = send(app(), get_req("/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/pace/to-bpm"].is_object());
    assert!(body["paths"]["/sessions/{id}"].is_object());
}

#[tokio::test]
async fn test_pace_conversions() {
    let (status, _, body) = send(app(), get_req("/pace/to-bpm?pace=8:00")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"bpm": 180, "pace": "8:00"}));

    let (_, _, body) = send(app(), get_req("/pace/to-bpm?pace=6:00")).await;
    assert_eq!(body["bpm"], 200);

    let (status, _, body) = send(app(), get_req("/pace/from-bpm?bpm=160")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"bpm": 160, "pace": "9:00"}));
}

#[tokio::test]
async fn test_pace_rejections() {
    let (status, _, body) = send(app(), get_req("/pace/to-bpm?pace=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _, _) = send(app(), get_req("/pace/to-bpm?pace=0:00")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(app(), get_req("/pace/from-bpm?bpm=250")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BPM must be between 120 and 200");
}

#[tokio::test]
async fn test_presets() {
    let (_, _, body) = send(app(), get_req("/pace/presets")).await;
    let labels: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, ["Easy", "Moderate", "Tempo", "Fast"]);
}

#[tokio::test]
async fn test_rank_tracks() {
    let track = |id: &str, tempo: Value| {
        json!({"id": id, "title": id, "artist": "A", "tempo": tempo, "duration_secs": 200})
    };
    let request = json_req(
        "POST",
        "/tracks/rank",
        json!({
            "target_bpm": 180,
            "tracks": [
                track("a", json!(183)),
                track("b", json!(160)),
                track("c", json!(179)),
                track("d", json!(177)),
                track("c", json!(120)),
                track("e", Value::Null),
            ]
        }),
    );
    let (status, _, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::OK);

    let ranked = body.as_array().unwrap();
    let ids: Vec<&str> = ranked.iter().map(|t| t["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["c", "a", "d", "b"]);
    assert_eq!(ranked[0]["quality"], "perfect");
    assert_eq!(ranked[3]["quality"], "poor");

    let bad = json_req("POST", "/tracks/rank", json!({"target_bpm": -1, "tracks": []}));
    let (status, _, _) = send(app(), bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_demo_mix() {
    let (status, _, body) = send(app(), get_req("/tracks/demo?bpm=170")).await;
    assert_eq!(status, StatusCode::OK);
    let ranked = body.as_array().unwrap();
    assert_eq!(ranked.len(), 5);
    assert_eq!(ranked[0]["tempo"], 170.0);
    assert!(ranked.iter().all(|t| t["quality"] == "perfect"));

    let (status, _, _) = send(app(), get_req("/tracks/demo?bpm=90")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_exchange_without_credentials() {
    let request = json_req(
        "POST",
        "/spotify/auth",
        json!({"code": "abc", "redirect_uri": "http://localhost/callback"}),
    );
    let (status, _, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("SPOTIFY_CLIENT_ID"));
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn test_proxy_validation() {
    let missing_token = json_req("POST", "/spotify/api", json!({"action": "current"}));
    let (status, _, body) = send(app(), missing_token).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Access token is required");

    let unknown = json_req(
        "POST",
        "/spotify/api",
        json!({"access_token": "t", "action": "shuffle"}),
    );
    let (status, _, body) = send(app(), unknown).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Invalid action: shuffle");
}

#[tokio::test]
async fn test_token_exchange_against_upstream() {
    let app = app_with_upstream().await;

    let ok = json_req(
        "POST",
        "/spotify/auth",
        json!({"code": "good-code", "redirect_uri": "http://localhost/callback"}),
    );
    let (status, _, body) = send(app.clone(), ok).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access_token"], TOKEN);
    assert_eq!(body["refresh_token"], "refresh");

    let rejected = json_req(
        "POST",
        "/spotify/auth",
        json!({"code": "stale", "redirect_uri": "http://localhost/callback"}),
    );
    let (status, _, body) = send(app, rejected).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "Spotify API error: invalid_grant - Invalid authorization code"
    );
}

#[tokio::test]
async fn test_proxy_against_upstream() {
    let app = app_with_upstream().await;

    let search = json_req(
        "POST",
        "/spotify/api",
        json!({"access_token": TOKEN, "action": "search", "data": {"query": "run", "limit": 4}}),
    );
    let (status, _, body) = send(app.clone(), search).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracks"]["items"].as_array().unwrap().len(), 4);

    let play = json_req(
        "POST",
        "/spotify/api",
        json!({"access_token": TOKEN, "action": "play", "data": {"uris": ["spotify:track:close"]}}),
    );
    let (_, _, body) = send(app.clone(), play).await;
    assert_eq!(body, json!({"success": true}));

    let pause = json_req(
        "POST",
        "/spotify/api",
        json!({"access_token": TOKEN, "action": "pause"}),
    );
    let (status, _, body) = send(app.clone(), pause).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": false}));

    // Token from the Authorization header instead of the body.
    let current = Request::builder()
        .method("POST")
        .uri("/spotify/api")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::from(json!({"action": "current"}).to_string()))
        .unwrap();
    let (_, _, body) = send(app.clone(), current).await;
    assert_eq!(body["is_playing"], true);

    let bad_token = json_req(
        "POST",
        "/spotify/api",
        json!({"access_token": "expired", "action": "current"}),
    );
    let (status, _, body) = send(app, bad_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid access token");
}

#[tokio::test]
async fn test_search_ranked_by_tempo() {
    let app = app_with_upstream().await;

    let plain = json_req(
        "POST",
        "/tracks/search",
        json!({"access_token": TOKEN, "query": "run"}),
    );
    let (status, _, body) = send(app.clone(), plain).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 4);
    assert!(body[0]["tempo"].is_null());

    let ranked = json_req(
        "POST",
        "/tracks/search",
        json!({"access_token": TOKEN, "query": "run", "target_bpm": 180}),
    );
    let (status, _, body) = send(app.clone(), ranked).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["close", "fast", "slow"]);
    assert_eq!(body[0]["tempo"], 178.9);
}

#[tokio::test]
async fn test_search_requires_query() {
    for query in ["", "   "] {
        let request = json_req(
            "POST",
            "/tracks/search",
            json!({"access_token": TOKEN, "query": query}),
        );
        let (status, _, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Search query is required");
    }
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = app_with_upstream().await;

    let start = json_req(
        "POST",
        "/sessions",
        json!({
            "target_bpm": 170,
            "optimize": true,
            "tracks": [
                {"id": "far", "title": "Slow Jam", "artist": "A", "tempo": 150.0, "duration_secs": 200},
                {"id": "close", "title": "Right On", "artist": "A", "tempo": 170.0, "duration_secs": 200},
                {"id": "far", "title": "Slow Jam", "artist": "A", "tempo": 150.0, "duration_secs": 200}
            ]
        }),
    );
    let (status, _, body) = send(app.clone(), start).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["target_bpm"], 170);
    assert_eq!(body["pace"], "0:00");
    assert_eq!(body["track_id"], "close");
    assert_eq!(body["playlist_minutes"], 6);
    let id = body["id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(150)).await;

    let (status, _, body) = send(app.clone(), get_req(&format!("/sessions/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["elapsed_secs"].as_u64().unwrap() >= 1);
    let cadence = body["cadence"].as_u64().unwrap();
    assert!((167..=173).contains(&cadence));
    assert!(body["track_position_secs"].as_u64().unwrap() >= 1);

    let next = json_req("POST", &format!("/sessions/{id}/next"), Value::Null);
    let (status, _, body) = send(app.clone(), next).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["track_id"], "far");
    assert_eq!(body["track_position_secs"], 0);

    let previous = json_req("POST", &format!("/sessions/{id}/previous"), Value::Null);
    let (_, _, body) = send(app.clone(), previous).await;
    assert_eq!(body["track_id"], "close");

    let pause = json_req("POST", &format!("/sessions/{id}/pause"), Value::Null);
    let (status, _, body) = send(app.clone(), pause).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");

    let again = json_req("POST", &format!("/sessions/{id}/pause"), Value::Null);
    let (status, _, _) = send(app.clone(), again).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stop = Request::builder()
        .method("DELETE")
        .uri(format!("/sessions/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app.clone(), stop).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "idle");

    let (status, _, _) = send(app, get_req(&format!("/sessions/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_rejects_out_of_range_target() {
    let request = json_req("POST", "/sessions", json!({"target_bpm": 100}));
    let (status, _, _) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_skip_needs_playlist() {
    let app = app();
    let start = json_req("POST", "/sessions", json!({"target_bpm": 180}));
    let (_, _, body) = send(app.clone(), start).await;
    assert!(body["track_id"].is_null());
    let id = body["id"].as_str().unwrap().to_string();

    let next = json_req("POST", &format!("/sessions/{id}/next"), Value::Null);
    let (status, _, body) = send(app, next).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Session has no playlist");
}
