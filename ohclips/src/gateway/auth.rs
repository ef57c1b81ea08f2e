use std::borrow::Cow;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{error::ApiError, state::AppState};

/// Verified principal id of the caller, inserted by [`require_principal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

/// Turns a bearer credential into a principal id.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<String, ApiError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("token lifetime is out of range")]
    TtlOutOfRange,
    #[error(transparent)]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// HS256 tokens whose `sub` claim is the principal id.
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Mints a token for `principal` valid for `ttl`.
    pub fn issue(&self, principal: &str, ttl: chrono::Duration) -> Result<String, IssueError> {
        let expires = Utc::now().checked_add_signed(ttl).ok_or(IssueError::TtlOutOfRange)?;
        let claims = Claims {
            sub: principal.to_string(),
            exp: expires.timestamp().max(0) as usize,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<String, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            log::warn!("rejected bearer token: {err}");
            unauthorized()
        })?;
        if data.claims.sub.is_empty() {
            return Err(unauthorized());
        }
        Ok(data.claims.sub)
    }
}

fn unauthorized() -> ApiError {
    ApiError::Unauthorized(Cow::Borrowed("Unauthorized"))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn require_principal(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return unauthorized().into_response();
    };
    match state.authenticator.authenticate(token).await {
        Ok(principal) => {
            req.extensions_mut().insert(Principal(principal));
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn issued_tokens_round_trip() {
        let auth = JwtAuthenticator::new("test-secret");
        let token = auth.issue("uid-1", chrono::Duration::minutes(5)).unwrap();
        assert_eq!(auth.authenticate(&token).await.unwrap(), "uid-1");
    }

    #[tokio::test]
    async fn expired_and_foreign_tokens_fail() {
        let auth = JwtAuthenticator::new("test-secret");
        let expired = auth.issue("uid-1", chrono::Duration::hours(-2)).unwrap();
        assert!(auth.authenticate(&expired).await.is_err());
        let foreign = JwtAuthenticator::new("other").issue("uid-1", chrono::Duration::minutes(5)).unwrap();
        assert!(auth.authenticate(&foreign).await.is_err());
    }

    #[test]
    fn lifetimes_past_the_calendar_are_refused() {
        let auth = JwtAuthenticator::new("test-secret");
        let result = auth.issue("uid-1", chrono::Duration::seconds(i64::MAX / 1000));
        assert!(matches!(result, Err(IssueError::TtlOutOfRange)));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
