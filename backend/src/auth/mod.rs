use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

/// Audience the session layer stamps on user access tokens.
pub const TOKEN_AUDIENCE: &str = "authenticated";

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub aud: String,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// For routes that also serve anonymous callers. A bad token is still rejected.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

/// HS256 secret shared with the session layer, installed as a request extension.
#[derive(Clone)]
pub struct AuthSecret(pub Arc<str>);

#[derive(Debug)]
pub struct AuthError(anyhow::Error);

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Unauthorized(err.0.to_string())
    }
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<AccessClaims, AuthError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);

    let token_data = decode::<AccessClaims>(token, &decoding_key, &validation)
        .map_err(|e| anyhow::anyhow!("JWT validation failed: {}", e))?;

    Ok(token_data.claims)
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(auth_header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".to_string()))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header format".to_string()))
}

fn authenticate(parts: &Parts, token: &str) -> Result<AuthUser, AppError> {
    let secret = parts
        .extensions
        .get::<AuthSecret>()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("auth secret extension missing")))?;

    let claims = validate_access_token(token, &secret.0)?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;

    Ok(AuthUser { user_id })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;
        authenticate(parts, token)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(OptionalAuthUser(Some(authenticate(parts, token)?))),
            None => Ok(OptionalAuthUser(None)),
        }
    }
}
