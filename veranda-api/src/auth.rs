use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use veranda_core::identity::{NewUser, ProfileUpdate, Role, UserProfile};

use crate::error::AppError;
use crate::middleware::auth::{AuthUser, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
}

fn issue_token(state: &AppState, user: &veranda_core::identity::User) -> Result<String, AppError> {
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.to_string(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

/// POST /v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    if req.name.len() < 2 || req.name.len() > 80 {
        return Err(AppError::ValidationError(
            "Name must be between 2 and 80 characters".to_string(),
        ));
    }
    if !req.email.contains('@') || req.email.len() > 120 {
        return Err(AppError::ValidationError("Invalid email".to_string()));
    }
    if req.password.len() < 6 {
        return Err(AppError::ValidationError(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    // Admin accounts are seeded, never self-registered.
    let role = req.role.unwrap_or(Role::Customer);
    if role == Role::Admin {
        return Err(AppError::ValidationError("Invalid role".to_string()));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let user = state
        .users
        .create(NewUser {
            email: req.email.to_lowercase(),
            password_hash,
            name: req.name,
            role,
            phone: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.profile())))
}

/// POST /v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .users
        .find_by_email(&req.email.to_lowercase())
        .await?
        .ok_or_else(|| AppError::AuthenticationError("Invalid credentials.".to_string()))?;

    let valid = bcrypt::verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if !valid {
        return Err(AppError::AuthenticationError(
            "Invalid credentials.".to_string(),
        ));
    }

    let token = issue_token(&state, &user)?;

    Ok(Json(AuthResponse {
        token,
        user: user.profile(),
    }))
}

/// GET /v1/auth/profile
pub async fn profile(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
) -> Result<Json<UserProfile>, AppError> {
    let user = crate::middleware::auth::require_user(user)?;

    let record = state
        .users
        .find(user.id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("User not found.".to_string()))?;

    Ok(Json(record.profile()))
}

/// PUT /v1/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let user = crate::middleware::auth::require_user(user)?;

    let password_hash = match req.password {
        Some(password) => {
            if password.len() < 6 {
                return Err(AppError::ValidationError(
                    "Password must be at least 6 characters".to_string(),
                ));
            }
            Some(
                bcrypt::hash(&password, bcrypt::DEFAULT_COST)
                    .map_err(|e| AppError::InternalServerError(e.to_string()))?,
            )
        }
        None => None,
    };

    let updated = state
        .users
        .update_profile(
            user.id,
            ProfileUpdate {
                name: req.name,
                phone: req.phone,
                avatar: req.avatar,
                password_hash,
            },
        )
        .await?;

    Ok(Json(updated.profile()))
}
