use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use veranda_core::identity::Role;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// Authenticated caller, injected into request extensions by the auth
/// middlewares below.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl TryFrom<Claims> for AuthUser {
    type Error = StatusCode;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| StatusCode::UNAUTHORIZED)?;
        Ok(AuthUser {
            id,
            email: claims.email,
            role,
        })
    }
}

fn decode_bearer(state: &AppState, req: &Request) -> Result<Option<AuthUser>, StatusCode> {
    let Some(auth_header) = req.headers().get("Authorization") else {
        return Ok(None);
    };

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(Some(AuthUser::try_from(token_data.claims)?))
}

// ============================================================================
// Context Middleware (mixed public/authenticated routes)
// ============================================================================

/// Attaches an `AuthUser` extension when a valid bearer token is present.
/// A present-but-invalid token is rejected outright; handlers that require
/// authentication call [`require_user`] on the optional extension.
pub async fn attach_user_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(user) = decode_bearer(&state, &req)? {
        req.extensions_mut().insert(user);
    }
    Ok(next.run(req).await)
}

pub fn require_user(user: Option<axum::Extension<AuthUser>>) -> Result<AuthUser, AppError> {
    user.map(|axum::Extension(u)| u)
        .ok_or_else(|| AppError::AuthenticationError("Authentication required".to_string()))
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = decode_bearer(&state, &req)?.ok_or(StatusCode::UNAUTHORIZED)?;

    if user.role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

// ============================================================================
// Merchant Authentication Middleware
// ============================================================================

pub async fn merchant_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = decode_bearer(&state, &req)?.ok_or(StatusCode::UNAUTHORIZED)?;

    if user.role != Role::Merchant {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
