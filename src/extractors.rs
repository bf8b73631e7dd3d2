use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::auth::guard::Identity;
use crate::auth::tokens::Tier;
use crate::error::AppError;
use crate::ids::ObjectId;
use crate::state::AppState;

/// Caller holding a User-tier token.
#[derive(Debug, Clone)]
pub struct UserSession(pub Identity);

/// Caller holding an AssociationUser-tier token.
#[derive(Debug, Clone)]
pub struct AssociationSession(pub Identity);

/// Caller holding a SuperUser-tier token.
#[derive(Debug, Clone)]
pub struct SuperSession(pub Identity);

async fn resolve(parts: &Parts, state: &AppState, tier: Tier) -> Result<ObjectId, AppError> {
    let token = extract_token(parts).ok_or(AppError::Unauthenticated)?;
    state.tokens.resolve(tier, token).await
}

impl FromRequestParts<AppState> for UserSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = resolve(parts, state, Tier::User).await?;
        Ok(UserSession(Identity::User(id)))
    }
}

impl FromRequestParts<AppState> for AssociationSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = resolve(parts, state, Tier::AssociationUser).await?;
        Ok(AssociationSession(Identity::AssociationUser(id)))
    }
}

impl FromRequestParts<AppState> for SuperSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = resolve(parts, state, Tier::SuperUser).await?;
        Ok(SuperSession(Identity::SuperUser(id)))
    }
}

/// Raw session token of the request, if any.
pub struct SessionToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for SessionToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_token(parts)
            .map(|t| SessionToken(t.to_string()))
            .ok_or(AppError::Unauthenticated)
    }
}

/// JSON body whose rejections come back in the usual error envelope.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
        }
    }
}

/// `Authorization: Bearer <token>`, falling back to a `token` query
/// parameter for older mobile clients.
pub fn extract_token(parts: &Parts) -> Option<&str> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    parts.uri.query()?.split('&').find_map(|pair| {
        let mut split = pair.splitn(2, '=');
        let key = split.next()?;
        let val = split.next()?;
        if key == "token" && !val.is_empty() {
            Some(val)
        } else {
            None
        }
    })
}
