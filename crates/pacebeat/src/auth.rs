//! Access token plumbing.
//!
//! The server never stores user tokens. Callers hand them over per request,
//! either in the JSON body or as a bearer `Authorization` header, and core
//! code asks an [`AccessTokenProvider`] when it needs one.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::spotify::SpotifyError;

/// Supplies the current user's access token for upstream calls.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Option<String>;
}

/// A token known up front, e.g. the one attached to the current request.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }
}

// Extractor for an optional bearer token
pub struct BearerToken(pub Option<String>);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(BearerToken(token))
    }
}

impl BearerToken {
    /// Picks the body token when present, falling back to the header.
    pub fn resolve(self, body_token: Option<String>) -> Result<String, SpotifyError> {
        body_token
            .filter(|t| !t.is_empty())
            .or(self.0)
            .ok_or(SpotifyError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::Request;

    async fn extract(header: Option<&str>) -> BearerToken {
        let mut builder = Request::builder().uri("/spotify/api");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        BearerToken::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_bearer_header() {
        assert_eq!(extract(Some("Bearer abc")).await.0.as_deref(), Some("abc"));
        assert_eq!(extract(Some("Basic abc")).await.0, None);
        assert_eq!(extract(Some("Bearer ")).await.0, None);
        assert_eq!(extract(None).await.0, None);
    }

    #[tokio::test]
    async fn test_resolve_prefers_body() {
        let header = extract(Some("Bearer from-header")).await;
        assert_eq!(header.resolve(Some("from-body".into())).unwrap(), "from-body");

        let header = extract(Some("Bearer from-header")).await;
        assert_eq!(header.resolve(Some(String::new())).unwrap(), "from-header");

        let none = extract(None).await;
        assert!(matches!(none.resolve(None), Err(SpotifyError::MissingToken)));
    }

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(StaticToken("t".into()).access_token().await.as_deref(), Some("t"));
        assert_eq!(StaticToken(String::new()).access_token().await, None);
    }
}
