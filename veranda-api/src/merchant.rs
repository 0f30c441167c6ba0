use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use veranda_booking::models::{Booking, BookingStatus};
use veranda_booking::repository::{BookingFilter, BookingStats, StatsWindow};
use veranda_catalog::property::{Property, PropertyFilter};
use veranda_core::repository::Page;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MerchantBookingsQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MerchantStatsQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct MerchantPropertiesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /v1/merchant/properties
/// All of the merchant's listings, whatever their approval status.
pub async fn properties(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MerchantPropertiesQuery>,
) -> Result<Json<Vec<Property>>, AppError> {
    let properties = state
        .properties
        .list(
            PropertyFilter {
                merchant_id: Some(user.id),
                ..Default::default()
            },
            Page::new(query.limit, query.offset),
        )
        .await?;

    Ok(Json(properties))
}

/// GET /v1/merchant/bookings
pub async fn bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MerchantBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .booking_manager
        .list(
            BookingFilter {
                merchant_id: Some(user.id),
                status: query.status,
                ..Default::default()
            },
            Page::new(query.limit, query.offset),
        )
        .await?;

    Ok(Json(bookings))
}

/// GET /v1/merchant/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MerchantStatsQuery>,
) -> Result<Json<BookingStats>, AppError> {
    let stats = state
        .booking_manager
        .stats(StatsWindow {
            merchant_id: Some(user.id),
            start: query
                .start_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            end: query
                .end_date
                .and_then(|d| d.and_hms_opt(23, 59, 59))
                .map(|dt| dt.and_utc()),
        })
        .await?;

    Ok(Json(stats))
}
