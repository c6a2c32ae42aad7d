//! Client for the upstream music API.
//!
//! Covers the OAuth code exchange and the small set of player/search
//! actions the app proxies. Responses are passed through as raw JSON.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::{
    auth::AccessTokenProvider,
    matcher::{Track, TempoSource},
};

pub const DEFAULT_API_BASE: &str = "https://api.spotify.com";
pub const DEFAULT_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error(
        "Spotify credentials not configured. Please set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET environment variables."
    )]
    CredentialsMissing,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Spotify API error: {error} - {description}")]
    ExchangeRejected {
        status: u16,
        error: String,
        description: String,
    },

    #[error("Access token is required")]
    MissingToken,

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid {action} data: {message}")]
    InvalidData {
        action: &'static str,
        message: String,
    },

    #[error("Invalid upstream base URL: {0}")]
    BaseUrl(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream returned status {status}")]
    Upstream { status: u16, body: Value },
}

/// Upstream endpoints and client credentials.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base: String,
    pub accounts_base: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base: DEFAULT_API_BASE.to_string(),
            accounts_base: DEFAULT_ACCOUNTS_BASE.to_string(),
        }
    }
}

impl SpotifyConfig {
    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_search_type", rename = "type")]
    pub kind: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

fn default_search_type() -> String {
    "track".to_string()
}

fn default_search_limit() -> u32 {
    DEFAULT_SEARCH_LIMIT
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct AudioFeaturesParams {
    track_id: String,
}

/// A proxied player or catalog action.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    Search(SearchParams),
    /// Body forwarded verbatim, e.g. `{"uris": [...]}`.
    Play(Value),
    Pause,
    Next,
    Current,
    AudioFeatures { track_id: String },
}

impl PlayerAction {
    /// Builds an action from its wire tag and payload.
    pub fn parse(action: &str, data: Value) -> Result<Self, SpotifyError> {
        match action {
            "search" => Ok(PlayerAction::Search(from_data("search", data)?)),
            "play" => Ok(PlayerAction::Play(if data.is_null() { json!({}) } else { data })),
            "pause" => Ok(PlayerAction::Pause),
            "next" => Ok(PlayerAction::Next),
            "current" => Ok(PlayerAction::Current),
            "audio-features" => {
                let params: AudioFeaturesParams = from_data("audio-features", data)?;
                Ok(PlayerAction::AudioFeatures {
                    track_id: params.track_id,
                })
            }
            other => Err(SpotifyError::InvalidAction(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlayerAction::Search(_) => "search",
            PlayerAction::Play(_) => "play",
            PlayerAction::Pause => "pause",
            PlayerAction::Next => "next",
            PlayerAction::Current => "current",
            PlayerAction::AudioFeatures { .. } => "audio-features",
        }
    }
}

fn from_data<T: for<'de> Deserialize<'de>>(
    action: &'static str,
    data: Value,
) -> Result<T, SpotifyError> {
    serde_json::from_value(data).map_err(|e| SpotifyError::InvalidData {
        action,
        message: e.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
    duration_ms: u64,
}

impl From<SpotifyTrack> for Track {
    fn from(t: SpotifyTrack) -> Self {
        Track {
            id: t.id,
            title: t.name,
            artist: t
                .artists
                .into_iter()
                .next()
                .map(|a| a.name)
                .unwrap_or_default(),
            cover_url: t.album.images.into_iter().next().map(|i| i.url),
            album: t.album.name,
            tempo: None,
            duration_secs: (t.duration_ms / 1000) as u32,
        }
    }
}

/// Extracts tracks from a search response, skipping malformed items.
pub fn tracks_from_search(body: &Value) -> Vec<Track> {
    body.pointer("/tracks/items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<SpotifyTrack>(item.clone()).ok())
                .map(Track::from)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    config: Arc<SpotifyConfig>,
}

impl SpotifyClient {
    pub fn new(config: SpotifyConfig) -> Self {
        Self::with_http(Client::new(), config)
    }

    pub fn with_http(http: Client, config: SpotifyConfig) -> Self {
        Self {
            http,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SpotifyConfig {
        &self.config
    }

    /// Trades an authorization code for an access token. The upstream JSON
    /// is returned as-is.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Value, SpotifyError> {
        let (client_id, client_secret) = self
            .config
            .credentials()
            .ok_or(SpotifyError::CredentialsMissing)?;
        if code.is_empty() {
            return Err(SpotifyError::MissingField("Authorization code"));
        }
        if redirect_uri.is_empty() {
            return Err(SpotifyError::MissingField("Redirect URI"));
        }

        let url = api_url(&self.config.accounts_base, &["api", "token"])?;
        let resp = self
            .http
            .post(url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        let (status, body) = read_body(resp).await?;
        tracing::info!(status = status.as_u16(), "Token exchange completed");

        if !status.is_success() {
            let field = |name: &str| {
                body.get(name)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            let error = match field("error") {
                e if e.is_empty() => "Unknown error".to_string(),
                e => e,
            };
            return Err(SpotifyError::ExchangeRejected {
                status: status.as_u16(),
                error,
                description: field("error_description"),
            });
        }

        Ok(body)
    }

    /// Runs a proxied action with the caller's access token.
    ///
    /// Player commands answer `{"success": bool}`. Reads return the upstream
    /// body, or [`SpotifyError::Upstream`] with its status on failure.
    pub async fn perform(&self, token: &str, action: &PlayerAction) -> Result<Value, SpotifyError> {
        if token.is_empty() {
            return Err(SpotifyError::MissingToken);
        }
        let api = &self.config.api_base;

        let request = match action {
            PlayerAction::Search(params) => self
                .http
                .get(api_url(api, &["v1", "search"])?)
                .query(&[
                    ("q", params.query.as_str()),
                    ("type", params.kind.as_str()),
                    ("limit", params.limit.to_string().as_str()),
                ]),
            PlayerAction::Play(body) => self
                .http
                .request(Method::PUT, api_url(api, &["v1", "me", "player", "play"])?)
                .json(body),
            PlayerAction::Pause => self
                .http
                .request(Method::PUT, api_url(api, &["v1", "me", "player", "pause"])?),
            PlayerAction::Next => self
                .http
                .post(api_url(api, &["v1", "me", "player", "next"])?),
            PlayerAction::Current => self
                .http
                .get(api_url(api, &["v1", "me", "player", "currently-playing"])?),
            PlayerAction::AudioFeatures { track_id } => self
                .http
                .get(api_url(api, &["v1", "audio-features", track_id.as_str()])?),
        };

        let resp = request.bearer_auth(token).send().await?;
        let status = resp.status();
        tracing::debug!(action = action.name(), status = status.as_u16(), "Upstream call");

        match action {
            PlayerAction::Play(_) | PlayerAction::Pause | PlayerAction::Next => {
                Ok(json!({ "success": status.is_success() }))
            }
            _ => {
                let (status, body) = read_body(resp).await?;
                if status.is_success() {
                    Ok(body)
                } else {
                    Err(SpotifyError::Upstream {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
        }
    }

    pub async fn search_tracks(
        &self,
        token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Track>, SpotifyError> {
        let body = self
            .perform(
                token,
                &PlayerAction::Search(SearchParams {
                    query: query.to_string(),
                    kind: default_search_type(),
                    limit,
                }),
            )
            .await?;
        Ok(tracks_from_search(&body))
    }

    /// Measured tempo of a track, if the analysis has one.
    pub async fn tempo(&self, token: &str, track_id: &str) -> Result<Option<f64>, SpotifyError> {
        let body = self
            .perform(
                token,
                &PlayerAction::AudioFeatures {
                    track_id: track_id.to_string(),
                },
            )
            .await?;
        Ok(body.get("tempo").and_then(Value::as_f64))
    }
}

/// Appends `segments` to `base`, percent-encoding each one so ids cannot
/// alter the path.
fn api_url(base: &str, segments: &[&str]) -> Result<Url, SpotifyError> {
    let mut url = Url::parse(base).map_err(|e| SpotifyError::BaseUrl(format!("{base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| SpotifyError::BaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Reads a response body as JSON. An empty body reads as `null`; a body
/// that is not JSON is kept as a string.
async fn read_body(resp: Response) -> Result<(StatusCode, Value), SpotifyError> {
    let status = resp.status();
    let text = resp.text().await?;
    if text.trim().is_empty() {
        return Ok((status, Value::Null));
    }
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok((status, body))
}

/// Tempo lookups against the upstream audio analysis, authenticated by an
/// injected token provider.
pub struct SpotifyTempo {
    client: SpotifyClient,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl SpotifyTempo {
    pub fn new(client: SpotifyClient, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self { client, tokens }
    }
}

#[async_trait]
impl TempoSource for SpotifyTempo {
    async fn tempo(&self, track_id: &str) -> anyhow::Result<Option<f64>> {
        let token = self
            .tokens
            .access_token()
            .await
            .ok_or(SpotifyError::MissingToken)?;
        Ok(self.client.tempo(&token, track_id).await?)
    }
}
