use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use veranda_booking::models::{NewPayment, Payment, PaymentMethod, PaymentStatus};
use veranda_booking::repository::{PaymentFilter, PaymentRepository, PaymentStats, StatsWindow};
use veranda_core::repository::Page;
use veranda_core::{CoreError, CoreResult};

pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PAYMENT_COLUMNS: &str = "id, booking_id, user_id, amount, currency, method, status, \
     transaction_id, payment_data, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    currency: String,
    method: String,
    status: String,
    transaction_id: Option<String>,
    payment_data: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> CoreResult<Payment> {
        let status = match self.status.as_str() {
            "pending" => PaymentStatus::Pending,
            "completed" => PaymentStatus::Completed,
            "failed" => PaymentStatus::Failed,
            "refund_pending" => PaymentStatus::RefundPending,
            "refunded" => PaymentStatus::Refunded,
            other => {
                return Err(CoreError::InternalError(format!(
                    "Unknown payment status in store: {other}"
                )))
            }
        };

        Ok(Payment {
            id: self.id,
            booking_id: self.booking_id,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            method: self.method.parse::<PaymentMethod>()?,
            status,
            transaction_id: self.transaction_id,
            payment_data: self.payment_data,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn internal(e: sqlx::Error) -> CoreError {
    CoreError::InternalError(e.to_string())
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn create(&self, payment: NewPayment) -> CoreResult<Payment> {
        let sql = format!(
            "INSERT INTO payments \
                (id, booking_id, user_id, amount, currency, method, status, \
                 transaction_id, payment_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {PAYMENT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(payment.booking_id)
            .bind(payment.user_id)
            .bind(payment.amount)
            .bind(&payment.currency)
            .bind(payment.method.as_str())
            .bind(payment.status.as_str())
            .bind(&payment.transaction_id)
            .bind(&payment.payment_data)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;

        row.into_payment()
    }

    async fn find(&self, id: Uuid) -> CoreResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn list_by_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE booking_id = $1 ORDER BY created_at DESC"
        );

        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    async fn list(&self, filter: PaymentFilter, page: Page) -> CoreResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE ($1::uuid IS NULL OR user_id = $1) \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::text IS NULL OR method = $3) \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        );

        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(filter.user_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.method.map(|m| m.as_str()))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        data_patch: serde_json::Value,
    ) -> CoreResult<Payment> {
        let sql = format!(
            "UPDATE payments SET \
                status = $2, \
                payment_data = COALESCE(payment_data, '{{}}'::jsonb) || $3::jsonb, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {PAYMENT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(&data_patch)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| CoreError::NotFound("Payment not found.".to_string()))?;

        row.into_payment()
    }

    async fn stats(&self, window: StatsWindow) -> CoreResult<PaymentStats> {
        #[derive(sqlx::FromRow)]
        struct StatsRow {
            total: i64,
            completed: i64,
            completed_amount: Decimal,
            pending: i64,
            pending_amount: Decimal,
            failed: i64,
            refunded: i64,
        }

        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed, \
                    COALESCE(SUM(amount) FILTER (WHERE status = 'completed'), 0) AS completed_amount, \
                    COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
                    COALESCE(SUM(amount) FILTER (WHERE status = 'pending'), 0) AS pending_amount, \
                    COUNT(*) FILTER (WHERE status = 'failed') AS failed, \
                    COUNT(*) FILTER (WHERE status = 'refunded') AS refunded \
             FROM payments \
             WHERE ($1::timestamptz IS NULL OR created_at >= $1) \
               AND ($2::timestamptz IS NULL OR created_at <= $2)",
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;

        Ok(PaymentStats {
            total: row.total,
            completed: row.completed,
            completed_amount: row.completed_amount,
            pending: row.pending,
            pending_amount: row.pending_amount,
            failed: row.failed,
            refunded: row.refunded,
        })
    }
}
