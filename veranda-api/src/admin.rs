use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use veranda_booking::models::{Booking, BookingStatus, Payment, PaymentMethod, PaymentStatus};
use veranda_booking::repository::{BookingFilter, PaymentFilter, PaymentStats, StatsWindow};
use veranda_core::identity::{Role, UserProfile};
use veranda_core::repository::Page;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UserDirectoryQuery {
    pub role: Option<Role>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AdminBookingsQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AdminPaymentsQuery {
    pub status: Option<PaymentStatus>,
    pub method: Option<PaymentMethod>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRefundRequest {
    pub approved: bool,
}

fn window_from(query: &StatsQuery) -> StatsWindow {
    StatsWindow {
        merchant_id: None,
        start: query
            .start_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc()),
        end: query
            .end_date
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .map(|dt| dt.and_utc()),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/admin/users
pub async fn user_directory(
    State(state): State<AppState>,
    Query(query): Query<UserDirectoryQuery>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let users = state
        .users
        .list(query.role, Page::new(query.limit, query.offset))
        .await?;

    Ok(Json(users.iter().map(|u| u.profile()).collect()))
}

/// GET /v1/admin/analytics
/// Cross-domain dashboard aggregation.
pub async fn analytics(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let property_stats = state.properties.stats(None).await?;
    let booking_stats = state.booking_manager.stats(StatsWindow::default()).await?;
    let payment_stats = state
        .payment_processor
        .stats(StatsWindow::default())
        .await?;
    let users = state
        .users
        .list(None, Page::new(Some(100), Some(0)))
        .await?;

    let mut breakdown = serde_json::Map::new();
    for user in &users {
        let count = breakdown
            .entry(user.role.to_string())
            .or_insert_with(|| json!(0));
        *count = json!(count.as_i64().unwrap_or(0) + 1);
    }

    Ok(Json(json!({
        "properties": property_stats,
        "bookings": booking_stats,
        "payments": payment_stats,
        "users": {
            "total": users.len(),
            "breakdown": breakdown,
        }
    })))
}

/// GET /v1/admin/bookings
pub async fn all_bookings(
    State(state): State<AppState>,
    Query(query): Query<AdminBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .booking_manager
        .list(
            BookingFilter {
                status: query.status,
                ..Default::default()
            },
            Page::new(query.limit, query.offset),
        )
        .await?;

    Ok(Json(bookings))
}

/// GET /v1/admin/payments
pub async fn all_payments(
    State(state): State<AppState>,
    Query(query): Query<AdminPaymentsQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state
        .payment_processor
        .list(
            PaymentFilter {
                user_id: None,
                status: query.status,
                method: query.method,
            },
            Page::new(query.limit, query.offset),
        )
        .await?;

    Ok(Json(payments))
}

/// GET /v1/admin/payments/stats
pub async fn payment_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<PaymentStats>, AppError> {
    let stats = state.payment_processor.stats(window_from(&query)).await?;
    Ok(Json(stats))
}

/// POST /v1/admin/payments/:id/refund
/// Approve or decline a pending refund. Approval cascades to the booking.
pub async fn process_refund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProcessRefundRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let payment = state
        .payment_processor
        .process_refund(id, req.approved)
        .await?;

    Ok(Json(json!({
        "message": if req.approved { "Refund approved" } else { "Refund rejected" },
        "data": payment,
    })))
}
