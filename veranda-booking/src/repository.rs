use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use veranda_core::repository::Page;
use veranda_core::CoreResult;

use crate::models::{
    Booking, BookingStatus, NewBooking, NewPayment, Payment, PaymentMethod, PaymentStatus,
};

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub user_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    /// Restrict to bookings on properties owned by this merchant.
    pub merchant_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<PaymentStatus>,
    pub method: Option<PaymentMethod>,
}

/// Optional scoping for the read-side aggregations.
#[derive(Debug, Clone, Default)]
pub struct StatsWindow {
    pub merchant_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingStats {
    pub total: i64,
    /// Sum of total_price over paid bookings.
    pub revenue: Decimal,
    pub pending: i64,
    pub confirmed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStats {
    pub total: i64,
    pub completed: i64,
    pub completed_amount: Decimal,
    pub pending: i64,
    pub pending_amount: Decimal,
    pub failed: i64,
    pub refunded: i64,
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist a new booking in pending/unpaid state. The overlap check and
    /// the insert are one atomic unit per property; an occupied date range
    /// surfaces as `CoreError::Conflict` even under concurrent creation.
    async fn create(&self, booking: NewBooking) -> CoreResult<Booking>;

    async fn find(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    /// Newest-created first; soonest check-in first when filtered by
    /// property.
    async fn list(&self, filter: BookingFilter, page: Page) -> CoreResult<Vec<Booking>>;

    /// Count date-blocking bookings whose `[check_in, check_out)` intersects
    /// the given range.
    async fn count_overlapping(
        &self,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        exclude_booking_id: Option<Uuid>,
    ) -> CoreResult<i64>;

    async fn update_status(&self, id: Uuid, status: BookingStatus) -> CoreResult<Booking>;

    /// Settle a booking: payment_status -> paid, status -> confirmed, and
    /// the winning payment attempt recorded on the row. The flip is
    /// conditional on the booking still being unpaid; a lost race surfaces
    /// as `CoreError::ValidationError`.
    async fn mark_paid(
        &self,
        id: Uuid,
        payment_id: Uuid,
        method: PaymentMethod,
    ) -> CoreResult<Booking>;

    /// Refund cascade: payment_status -> refunded, status -> cancelled.
    async fn mark_refunded(&self, id: Uuid) -> CoreResult<Booking>;

    async fn stats(&self, window: StatsWindow) -> CoreResult<BookingStats>;
}

/// Repository trait for payment data access
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: NewPayment) -> CoreResult<Payment>;

    async fn find(&self, id: Uuid) -> CoreResult<Option<Payment>>;

    async fn list_by_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>>;

    async fn list(&self, filter: PaymentFilter, page: Page) -> CoreResult<Vec<Payment>>;

    /// Update the status and merge `data_patch` into the stored gateway
    /// payload (top-level keys).
    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        data_patch: serde_json::Value,
    ) -> CoreResult<Payment>;

    async fn stats(&self, window: StatsWindow) -> CoreResult<PaymentStats>;
}
