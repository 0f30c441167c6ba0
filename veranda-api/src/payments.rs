use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use veranda_booking::models::Payment;
use veranda_booking::payments::PaymentRequest;
use veranda_booking::repository::PaymentFilter;
use veranda_core::identity::Role;
use veranda_core::repository::Page;

use crate::error::AppError;
use crate::middleware::auth::{require_user, AuthUser};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PayResponse {
    pub success: bool,
    pub message: String,
    pub data: Payment,
}

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub status: Option<veranda_booking::models::PaymentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub reason: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings/:id/pay
/// The body carries `method` plus whatever method-specific fields the
/// gateway wants; it is passed through opaquely. A gateway decline comes
/// back as 400 with success=false and the persisted failed payment.
pub async fn pay_booking(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<PayResponse>), AppError> {
    let user = require_user(user)?;

    let method = body
        .get("method")
        .and_then(|m| m.as_str())
        .ok_or_else(|| AppError::ValidationError("Invalid payment method.".to_string()))?
        .to_string();

    let receipt = state
        .payment_processor
        .process(
            id,
            user.id,
            PaymentRequest {
                method,
                fields: body,
            },
        )
        .await?;

    let status = if receipt.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((
        status,
        Json(PayResponse {
            success: receipt.success,
            message: receipt.message,
            data: receipt.payment,
        }),
    ))
}

/// GET /v1/payments/methods
pub async fn payment_methods() -> Json<serde_json::Value> {
    Json(json!([
        {
            "id": "credit_card",
            "name": "Credit Card",
            "description": "Pay with Visa, MasterCard, or American Express",
            "enabled": true
        },
        {
            "id": "paypal",
            "name": "PayPal",
            "description": "Pay securely with your PayPal account",
            "enabled": true
        },
        {
            "id": "bank_transfer",
            "name": "Bank Transfer",
            "description": "Direct bank transfer",
            "enabled": true
        },
        {
            "id": "stripe",
            "name": "Stripe",
            "description": "Pay with Stripe",
            "enabled": true
        }
    ]))
}

/// GET /v1/payments
/// The caller's own payment history.
pub async fn list_mine(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let user = require_user(user)?;

    let payments = state
        .payment_processor
        .list(
            PaymentFilter {
                user_id: Some(user.id),
                status: query.status,
                method: None,
            },
            Page::new(query.limit, query.offset),
        )
        .await?;

    Ok(Json(payments))
}

/// GET /v1/payments/:id
pub async fn get_one(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let user = require_user(user)?;
    let payment = state.payment_processor.get(id).await?;

    if payment.user_id != user.id && user.role != Role::Admin {
        return Err(AppError::AuthorizationError("Not authorized".to_string()));
    }

    Ok(Json(payment))
}

/// POST /v1/payments/:id/refund
pub async fn request_refund(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<Payment>, AppError> {
    let user = require_user(user)?;

    let payment = state
        .payment_processor
        .request_refund(id, user.id, req.reason)
        .await?;

    Ok(Json(payment))
}
