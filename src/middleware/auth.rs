use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{
    dto::auth::Claims,
    error::{AppError, AppResult},
    state::AppState,
};

pub const GUEST_ID_HEADER: &str = "x-guest-id";

/// The identity a request acts for: a signed-in user or an anonymous guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Principal {
    User(Uuid),
    Guest(Uuid),
}

impl Principal {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Principal::User(id) => Some(*id),
            Principal::Guest(_) => None,
        }
    }

    pub fn guest_id(&self) -> Option<Uuid> {
        match self {
            Principal::Guest(id) => Some(*id),
            Principal::User(_) => None,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Principal::Guest(_))
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

impl AuthUser {
    pub fn principal(&self) -> Principal {
        Principal::User(self.user_id)
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "admin")
}

/// Decodes the bearer token if one is present. A present but invalid token is an error.
fn bearer_user(headers: &HeaderMap, secret: &str) -> AppResult<Option<AuthUser>> {
    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("invalid Authorization header".into()))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthorized("invalid Authorization scheme".into()))?;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("invalid or expired token".into()))?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::Unauthorized("invalid user id in token".into()))?;

    Ok(Some(AuthUser {
        user_id,
        role: decoded.claims.role,
    }))
}

pub fn auth_user_from_headers(headers: &HeaderMap, secret: &str) -> AppResult<AuthUser> {
    bearer_user(headers, secret)?
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".into()))
}

pub fn principal_from_headers(headers: &HeaderMap, secret: &str) -> AppResult<Principal> {
    if let Some(user) = bearer_user(headers, secret)? {
        return Ok(user.principal());
    }

    let guest = headers
        .get(GUEST_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("missing Authorization or X-Guest-Id header".into()))?;
    let guest_id = guest
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized("X-Guest-Id must be a uuid".into()))?;
    Ok(Principal::Guest(guest_id))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        auth_user_from_headers(&parts.headers, &state.config.jwt_secret)
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers, &state.config.jwt_secret)
    }
}
