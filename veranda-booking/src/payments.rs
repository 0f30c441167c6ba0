use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use veranda_core::gateway::{GatewayDecline, GatewayOutcome};
use veranda_core::repository::Page;
use veranda_core::{CoreError, CoreResult};

use crate::gateway::GatewayRegistry;
use crate::models::{
    Booking, BookingPaymentStatus, NewPayment, Payment, PaymentMethod, PaymentStatus,
};
use crate::repository::{
    BookingRepository, PaymentFilter, PaymentRepository, PaymentStats, StatsWindow,
};

/// What the caller gets back from a payment attempt. A gateway decline is a
/// successful call with `success == false` and a persisted failed payment,
/// never an error.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub success: bool,
    pub message: String,
    pub payment: Payment,
}

/// Opaque payment request: the method name plus whatever method-specific
/// fields the client sent. Field interpretation is the gateway's business.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub method: String,
    pub fields: serde_json::Value,
}

pub struct PaymentProcessor {
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateways: Arc<GatewayRegistry>,
    gateway_timeout: Duration,
}

impl PaymentProcessor {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateways: Arc<GatewayRegistry>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            bookings,
            payments,
            gateways,
            gateway_timeout,
        }
    }

    /// Process a payment attempt for a booking.
    pub async fn process(
        &self,
        booking_id: Uuid,
        payer_id: Uuid,
        req: PaymentRequest,
    ) -> CoreResult<PaymentReceipt> {
        let booking = self
            .bookings
            .find(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Booking not found.".to_string()))?;

        if booking.user_id != payer_id {
            return Err(CoreError::Forbidden(
                "Not authorized to pay for this booking.".to_string(),
            ));
        }

        if booking.payment_status == BookingPaymentStatus::Paid {
            return Err(CoreError::ValidationError(
                "Booking already paid.".to_string(),
            ));
        }

        // Zero-priced bookings settle synthetically, whatever method was
        // requested. A completed payment record is still written for audit
        // consistency.
        if booking.total_price.is_zero() {
            return self.settle_free(&booking, payer_id).await;
        }

        let method = PaymentMethod::from_str(&req.method)?;
        if method == PaymentMethod::Free {
            return Err(CoreError::ValidationError(
                "Free method not allowed for paid bookings.".to_string(),
            ));
        }

        let gateway = self
            .gateways
            .get(method)
            .ok_or_else(|| CoreError::ValidationError("Invalid payment method.".to_string()))?;

        let charge = gateway.charge(booking.total_price, &booking.currency, &req.fields);
        let outcome = match tokio::time::timeout(self.gateway_timeout, charge).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(booking_id = %booking.id, method = %method, "Gateway call timed out");
                GatewayOutcome::Declined(GatewayDecline {
                    message: "Gateway timeout".to_string(),
                    code: "GATEWAY_TIMEOUT".to_string(),
                })
            }
        };

        let mut payment_data = serde_json::to_value(&outcome)
            .map_err(|e| CoreError::InternalError(e.to_string()))?;
        payment_data["processed_at"] = json!(Utc::now());

        let (status, transaction_id, success, message) = match &outcome {
            GatewayOutcome::Approved(approval) => (
                PaymentStatus::Completed,
                Some(approval.transaction_id.clone()),
                true,
                "Payment processed successfully".to_string(),
            ),
            GatewayOutcome::Declined(decline) => (
                PaymentStatus::Failed,
                None,
                false,
                decline.message.clone(),
            ),
        };

        let payment = self
            .payments
            .create(NewPayment {
                booking_id: booking.id,
                user_id: payer_id,
                amount: booking.total_price,
                currency: booking.currency.clone(),
                method,
                status,
                transaction_id,
                payment_data,
            })
            .await?;

        if success {
            self.bookings
                .mark_paid(booking.id, payment.id, method)
                .await?;
            info!(booking_id = %booking.id, payment_id = %payment.id, "Booking paid");
        } else {
            info!(booking_id = %booking.id, payment_id = %payment.id, "Payment attempt failed");
        }

        Ok(PaymentReceipt {
            success,
            message,
            payment,
        })
    }

    /// A customer asks for their money back. Only the payer can ask, and
    /// only a completed payment qualifies.
    pub async fn request_refund(
        &self,
        payment_id: Uuid,
        requester_id: Uuid,
        reason: Option<String>,
    ) -> CoreResult<Payment> {
        let payment = self.get(payment_id).await?;

        if payment.user_id != requester_id {
            return Err(CoreError::Forbidden("Not authorized.".to_string()));
        }

        if payment.status != PaymentStatus::Completed {
            return Err(CoreError::ValidationError(
                "Only completed payments can be refunded.".to_string(),
            ));
        }

        self.payments
            .update_status(
                payment_id,
                PaymentStatus::RefundPending,
                json!({
                    "refund_reason": reason,
                    "refund_requested_at": Utc::now(),
                }),
            )
            .await
    }

    /// Admin decision on a pending refund. Approval cascades to the booking
    /// (payment_status refunded, status cancelled); decline restores the
    /// payment to completed.
    pub async fn process_refund(&self, payment_id: Uuid, approved: bool) -> CoreResult<Payment> {
        let payment = self.get(payment_id).await?;

        let new_status = if approved {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::Completed
        };

        let updated = self
            .payments
            .update_status(
                payment_id,
                new_status,
                json!({
                    "refund_processed_at": Utc::now(),
                    "refund_approved": approved,
                }),
            )
            .await?;

        if approved {
            self.bookings.mark_refunded(payment.booking_id).await?;
            info!(payment_id = %payment_id, booking_id = %payment.booking_id, "Refund approved");
        }

        Ok(updated)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Payment> {
        self.payments
            .find(id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Payment not found.".to_string()))
    }

    pub async fn list_by_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        self.payments.list_by_booking(booking_id).await
    }

    pub async fn list(&self, filter: PaymentFilter, page: Page) -> CoreResult<Vec<Payment>> {
        self.payments.list(filter, page).await
    }

    pub async fn stats(&self, window: StatsWindow) -> CoreResult<PaymentStats> {
        self.payments.stats(window).await
    }

    async fn settle_free(&self, booking: &Booking, payer_id: Uuid) -> CoreResult<PaymentReceipt> {
        let transaction_id = format!(
            "FREE-{}",
            Uuid::new_v4().simple().to_string()[..8].to_uppercase()
        );

        let payment = self
            .payments
            .create(NewPayment {
                booking_id: booking.id,
                user_id: payer_id,
                amount: booking.total_price,
                currency: booking.currency.clone(),
                method: PaymentMethod::Free,
                status: PaymentStatus::Completed,
                transaction_id: Some(transaction_id),
                payment_data: json!({
                    "outcome": "approved",
                    "type": "free_booking",
                    "processed_at": Utc::now(),
                }),
            })
            .await?;

        self.bookings
            .mark_paid(booking.id, payment.id, PaymentMethod::Free)
            .await?;

        info!(booking_id = %booking.id, payment_id = %payment.id, "Free booking confirmed");

        Ok(PaymentReceipt {
            success: true,
            message: "Free booking confirmed successfully!".to_string(),
            payment,
        })
    }
}
