use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use crate::{
    matcher::MatchError, pace::PaceError, playlist::PlaylistError, session::SessionError,
    spotify::SpotifyError,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Session conflict: {0}")]
    Session(#[from] SessionError),

    #[error("Too many live sessions (limit {0})")]
    TooManySessions(usize),

    #[error("Authorization failed: {0}")]
    Auth(SpotifyError),

    #[error("Upstream error: {status}")]
    Upstream { status: u16, body: Value },

    #[error("Proxy error: {0}")]
    Proxy(SpotifyError),
}

impl From<PaceError> for AppError {
    fn from(e: PaceError) -> Self {
        AppError::InvalidInput(e.to_string())
    }
}

impl From<MatchError> for AppError {
    fn from(e: MatchError) -> Self {
        AppError::InvalidInput(e.to_string())
    }
}

impl From<PlaylistError> for AppError {
    fn from(e: PlaylistError) -> Self {
        AppError::InvalidInput(e.to_string())
    }
}

impl From<SpotifyError> for AppError {
    fn from(e: SpotifyError) -> Self {
        match e {
            SpotifyError::Upstream { status, body } => AppError::Upstream { status, body },
            SpotifyError::CredentialsMissing
            | SpotifyError::ExchangeRejected { .. }
            | SpotifyError::MissingField(_) => AppError::Auth(e),
            other => AppError::Proxy(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Upstream { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(body)).into_response()
            }
            AppError::Auth(e) => {
                error!("Token exchange failed: {e}");
                let body = Json(json!({
                    "error": e.to_string(),
                    "details": format!("{e:?}"),
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
            AppError::Proxy(e) => {
                error!("Proxy error: {e}");
                let body = Json(json!({ "error": e.to_string() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
            _ => {
                let (status, error_message) = match &self {
                    AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                    AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
                    AppError::Session(e) => (StatusCode::CONFLICT, e.to_string()),
                    AppError::TooManySessions(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
                    }
                    AppError::Upstream { .. } | AppError::Auth(_) | AppError::Proxy(_) => {
                        unreachable!()
                    }
                };

                let body = Json(json!({
                    "error": error_message,
                }));

                (status, body).into_response()
            }
        }
    }
}

/// Flattens `validator` field errors into one message.
pub fn validation_message(errors: &validator::ValidationErrors) -> String {
    let messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(_, errors)| {
            errors
                .iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        })
        .collect();
    messages.join(", ")
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(validation_message(&e))
    }
}
