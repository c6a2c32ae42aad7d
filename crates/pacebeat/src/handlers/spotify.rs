//! Proxy endpoints for the upstream music API.

use axum::{Extension, response::Json};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    auth::BearerToken,
    errors::AppError,
    request_id::RequestId,
    spotify::{PlayerAction, SpotifyClient},
};

#[derive(Deserialize, ToSchema)]
pub struct TokenExchangeRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub redirect_uri: String,
}

/// Exchange an OAuth authorization code for an access token.
#[utoipa::path(
    post,
    path = "/spotify/auth",
    tag = "spotify",
    request_body = TokenExchangeRequest,
    responses(
        (status = 200, description = "Upstream token response, verbatim"),
        (status = 500, description = "Credentials missing or code rejected")
    )
)]
pub async fn exchange_token(
    Extension(client): Extension<SpotifyClient>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<TokenExchangeRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::info!(
        %request_id,
        has_code = !req.code.is_empty(),
        redirect_uri = %req.redirect_uri,
        "Token exchange requested"
    );
    let body = client.exchange_code(&req.code, &req.redirect_uri).await?;
    Ok(Json(body))
}

#[derive(Deserialize, ToSchema)]
pub struct ProxyRequest {
    /// Falls back to the bearer `Authorization` header when absent.
    #[serde(default)]
    pub access_token: Option<String>,
    /// One of `search`, `play`, `pause`, `next`, `current`, `audio-features`.
    pub action: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
}

/// Forward a tagged player or catalog action upstream.
#[utoipa::path(
    post,
    path = "/spotify/api",
    tag = "spotify",
    request_body = ProxyRequest,
    responses(
        (status = 200, description = "Upstream body, or {success} for player commands"),
        (status = 500, description = "Missing token, unknown action or transport failure")
    )
)]
pub async fn proxy_action(
    Extension(client): Extension<SpotifyClient>,
    Extension(request_id): Extension<RequestId>,
    bearer: BearerToken,
    Json(req): Json<ProxyRequest>,
) -> Result<Json<Value>, AppError> {
    let token = bearer.resolve(req.access_token)?;
    let action = PlayerAction::parse(&req.action, req.data)?;

    let result = client.perform(&token, &action).await;
    if let Err(e) = &result {
        tracing::warn!(%request_id, action = action.name(), "Upstream action failed: {e}");
    }
    Ok(Json(result?))
}
