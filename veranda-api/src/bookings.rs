use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use veranda_booking::manager::CreateBooking;
use veranda_booking::models::{Booking, BookingStatus};
use veranda_booking::repository::BookingFilter;
use veranda_catalog::availability::AvailabilityQuote;
use veranda_core::identity::Role;
use veranda_core::repository::Page;

use crate::error::AppError;
use crate::middleware::auth::{require_user, AuthUser};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub exclude_booking_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    pub special_requests: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/bookings/check-availability
/// Pure read: no booking is created or held.
pub async fn check_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityQuote>, AppError> {
    let quote = state
        .booking_manager
        .check_availability(
            query.property_id,
            query.check_in,
            query.check_out,
            query.exclude_booking_id,
        )
        .await?;

    Ok(Json(quote))
}

/// GET /v1/bookings
/// Customers see their own bookings, merchants the bookings on their
/// properties, admins everything.
pub async fn list(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let user = require_user(user)?;

    let mut filter = BookingFilter {
        status: query.status,
        ..Default::default()
    };
    match user.role {
        Role::Admin => {}
        Role::Merchant => filter.merchant_id = Some(user.id),
        Role::Customer => filter.user_id = Some(user.id),
    }

    let bookings = state
        .booking_manager
        .list(filter, Page::new(query.limit, query.offset))
        .await?;

    Ok(Json(bookings))
}

/// GET /v1/bookings/:id
pub async fn get_one(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let user = require_user(user)?;
    let booking = state.booking_manager.get(id).await?;

    authorize_booking_access(&state, &booking, &user).await?;

    Ok(Json(booking))
}

/// POST /v1/bookings
pub async fn create(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let user = require_user(user)?;

    if req.guests < 1 {
        return Err(AppError::ValidationError(
            "Guest count must be positive".to_string(),
        ));
    }
    if let Some(notes) = &req.special_requests {
        if notes.len() > 500 {
            return Err(AppError::ValidationError(
                "Special requests must be at most 500 characters".to_string(),
            ));
        }
    }

    let booking = state
        .booking_manager
        .create(
            CreateBooking {
                property_id: req.property_id,
                check_in: req.check_in,
                check_out: req.check_out,
                guests: req.guests,
                special_requests: req.special_requests,
            },
            user.id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// PUT /v1/bookings/:id/status
/// Merchant (owning the property) or admin only.
pub async fn update_status(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let user = require_user(user)?;
    if user.role == Role::Customer {
        return Err(AppError::AuthorizationError("Not authorized".to_string()));
    }

    let booking = state.booking_manager.get(id).await?;
    if user.role == Role::Merchant {
        ensure_merchant_owns_property(&state, booking.property_id, &user).await?;
    }

    let new_status = req.status.parse::<BookingStatus>()?;
    let updated = state.booking_manager.update_status(id, new_status).await?;

    Ok(Json(updated))
}

/// POST /v1/bookings/:id/cancel
pub async fn cancel(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let user = require_user(user)?;
    let booking = state.booking_manager.cancel(id, user.id, user.role).await?;
    Ok(Json(booking))
}

// ============================================================================
// Authorization helpers
// ============================================================================

/// The merchant-owns-property check lives here at the boundary, not inside
/// the lifecycle manager.
async fn ensure_merchant_owns_property(
    state: &AppState,
    property_id: Uuid,
    user: &AuthUser,
) -> Result<(), AppError> {
    let property = state
        .properties
        .find(property_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Property not found.".to_string()))?;

    if property.merchant_id != user.id {
        return Err(AppError::AuthorizationError("Not authorized".to_string()));
    }
    Ok(())
}

async fn authorize_booking_access(
    state: &AppState,
    booking: &Booking,
    user: &AuthUser,
) -> Result<(), AppError> {
    if booking.user_id == user.id || user.role == Role::Admin {
        return Ok(());
    }
    if user.role == Role::Merchant {
        return ensure_merchant_owns_property(state, booking.property_id, user).await;
    }
    Err(AppError::AuthorizationError("Not authorized".to_string()))
}
