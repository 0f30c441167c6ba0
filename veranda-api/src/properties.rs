use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use veranda_catalog::property::{
    NewProperty, Property, PropertyFilter, PropertyStatus, PropertyUpdate,
};
use veranda_core::identity::Role;
use veranda_core::repository::Page;

use crate::error::AppError;
use crate::middleware::auth::{require_user, AuthUser};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListPropertiesQuery {
    pub location: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub guests: Option<i32>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePropertyRequest {
    pub name: String,
    pub description: Option<String>,
    pub location: String,
    pub address: Option<String>,
    pub price_per_night: Decimal,
    pub currency: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub max_guests: i32,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/properties
/// Public search over active listings
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListPropertiesQuery>,
) -> Result<Json<Vec<Property>>, AppError> {
    let properties = state
        .properties
        .list(
            PropertyFilter {
                status: Some(PropertyStatus::Active),
                merchant_id: None,
                location: query.location,
                min_price: query.min_price,
                max_price: query.max_price,
                guests: query.guests,
                search: query.search,
            },
            Page::new(query.limit, query.offset),
        )
        .await?;

    Ok(Json(properties))
}

/// GET /v1/properties/featured
pub async fn featured(
    State(state): State<AppState>,
    Query(query): Query<FeaturedQuery>,
) -> Result<Json<Vec<Property>>, AppError> {
    let properties = state
        .properties
        .featured(query.limit.unwrap_or(6).clamp(1, 20))
        .await?;
    Ok(Json(properties))
}

/// GET /v1/properties/:id
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Property>, AppError> {
    let property = state
        .properties
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Property not found.".to_string()))?;
    Ok(Json(property))
}

/// POST /v1/properties
/// Merchants create listings; they start in pending until an admin approves.
pub async fn create(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Json(req): Json<CreatePropertyRequest>,
) -> Result<(StatusCode, Json<Property>), AppError> {
    let user = require_user(user)?;
    if user.role != Role::Merchant {
        return Err(AppError::AuthorizationError(
            "Only merchants can create properties".to_string(),
        ));
    }

    if req.price_per_night < Decimal::ZERO {
        return Err(AppError::ValidationError(
            "Price per night must not be negative".to_string(),
        ));
    }
    if req.max_guests < 1 {
        return Err(AppError::ValidationError(
            "Max guests must be positive".to_string(),
        ));
    }
    if req.name.len() < 4 || req.name.len() > 140 {
        return Err(AppError::ValidationError(
            "Name must be between 4 and 140 characters".to_string(),
        ));
    }

    let property = state
        .properties
        .create(NewProperty {
            merchant_id: user.id,
            name: req.name,
            description: req.description,
            location: req.location,
            address: req.address,
            price_per_night: req.price_per_night,
            currency: req.currency.unwrap_or_else(|| "USD".to_string()),
            bedrooms: req.bedrooms.unwrap_or(1),
            bathrooms: req.bathrooms.unwrap_or(1),
            max_guests: req.max_guests,
            amenities: req.amenities,
            images: req.images,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(property)))
}

async fn find_owned(
    state: &AppState,
    id: Uuid,
    user: &AuthUser,
    action: &str,
) -> Result<Property, AppError> {
    let property = state
        .properties
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Property not found.".to_string()))?;

    if user.role != Role::Admin && property.merchant_id != user.id {
        return Err(AppError::AuthorizationError(format!(
            "Not allowed to {action} this property."
        )));
    }
    Ok(property)
}

/// PUT /v1/properties/:id
pub async fn update(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PropertyUpdate>,
) -> Result<Json<Property>, AppError> {
    let user = require_user(user)?;
    find_owned(&state, id, &user, "update").await?;

    if req.price_per_night.is_some_and(|p| p < Decimal::ZERO) {
        return Err(AppError::ValidationError(
            "Price per night must not be negative".to_string(),
        ));
    }

    let updated = state.properties.update(id, req).await?;
    Ok(Json(updated))
}

/// DELETE /v1/properties/:id
pub async fn remove(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let user = require_user(user)?;
    find_owned(&state, id, &user, "delete").await?;

    state.properties.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/properties/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Property>, AppError> {
    let user = require_user(user)?;
    if user.role != Role::Admin {
        return Err(AppError::AuthorizationError("Admin only".to_string()));
    }

    let property = state
        .properties
        .set_status(id, PropertyStatus::Active)
        .await?;
    Ok(Json(property))
}

/// POST /v1/properties/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Property>, AppError> {
    let user = require_user(user)?;
    if user.role != Role::Admin {
        return Err(AppError::AuthorizationError("Admin only".to_string()));
    }

    let property = state
        .properties
        .set_status(id, PropertyStatus::Rejected)
        .await?;
    Ok(Json(property))
}
