use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use veranda_booking::models::{
    Booking, BookingPaymentStatus, BookingStatus, NewBooking, PaymentMethod,
};
use veranda_booking::repository::{BookingFilter, BookingRepository, BookingStats, StatsWindow};
use veranda_core::repository::Page;
use veranda_core::{CoreError, CoreResult};

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "b.id, b.property_id, b.user_id, b.check_in, b.check_out, \
     b.guests, b.total_price, b.currency, b.status, b.payment_status, b.payment_id, \
     b.payment_method, b.special_requests, b.created_at, b.updated_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    property_id: Uuid,
    user_id: Uuid,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: i32,
    total_price: Decimal,
    currency: String,
    status: String,
    payment_status: String,
    payment_id: Option<Uuid>,
    payment_method: Option<String>,
    special_requests: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> CoreResult<Booking> {
        let payment_status = match self.payment_status.as_str() {
            "unpaid" => BookingPaymentStatus::Unpaid,
            "paid" => BookingPaymentStatus::Paid,
            "refunded" => BookingPaymentStatus::Refunded,
            other => {
                return Err(CoreError::InternalError(format!(
                    "Unknown payment status in store: {other}"
                )))
            }
        };

        Ok(Booking {
            id: self.id,
            property_id: self.property_id,
            user_id: self.user_id,
            check_in: self.check_in,
            check_out: self.check_out,
            guests: self.guests,
            total_price: self.total_price,
            currency: self.currency,
            status: self.status.parse::<BookingStatus>()?,
            payment_status,
            payment_id: self.payment_id,
            payment_method: self
                .payment_method
                .as_deref()
                .map(str::parse::<PaymentMethod>)
                .transpose()?,
            special_requests: self.special_requests,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn internal(e: sqlx::Error) -> CoreError {
    CoreError::InternalError(e.to_string())
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create(&self, booking: NewBooking) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        // Per-property serialization boundary: the row lock forces
        // concurrent creations for the same property through here one at a
        // time, so the overlap check below cannot be stale at insert time.
        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM properties WHERE id = $1 FOR UPDATE")
                .bind(booking.property_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(internal)?;

        if locked.is_none() {
            return Err(CoreError::NotFound("Property unavailable.".to_string()));
        }

        let (conflicts,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings \
             WHERE property_id = $1 \
               AND status NOT IN ('cancelled', 'rejected') \
               AND check_in < $3 AND check_out > $2",
        )
        .bind(booking.property_id)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .fetch_one(&mut *tx)
        .await
        .map_err(internal)?;

        if conflicts > 0 {
            return Err(CoreError::Conflict("Dates already reserved.".to_string()));
        }

        let sql = format!(
            "INSERT INTO bookings AS b \
                (id, property_id, user_id, check_in, check_out, guests, total_price, \
                 currency, status, payment_status, special_requests) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', 'unpaid', $9) \
             RETURNING {BOOKING_COLUMNS}"
        );

        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(booking.property_id)
            .bind(booking.user_id)
            .bind(booking.check_in)
            .bind(booking.check_out)
            .bind(booking.guests)
            .bind(booking.total_price)
            .bind(&booking.currency)
            .bind(&booking.special_requests)
            .fetch_one(&mut *tx)
            .await
            .map_err(internal)?;

        tx.commit().await.map_err(internal)?;

        row.into_booking()
    }

    async fn find(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = $1");
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn list(&self, filter: BookingFilter, page: Page) -> CoreResult<Vec<Booking>> {
        // Soonest stay first when scoped to a property's calendar, newest
        // booking first everywhere else.
        let order = if filter.property_id.is_some() {
            "b.check_in ASC"
        } else {
            "b.created_at DESC"
        };

        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b \
             LEFT JOIN properties p ON b.property_id = p.id \
             WHERE ($1::uuid IS NULL OR b.user_id = $1) \
               AND ($2::uuid IS NULL OR b.property_id = $2) \
               AND ($3::uuid IS NULL OR p.merchant_id = $3) \
               AND ($4::text IS NULL OR b.status = $4) \
             ORDER BY {order} LIMIT $5 OFFSET $6"
        );

        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(filter.user_id)
            .bind(filter.property_id)
            .bind(filter.merchant_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn count_overlapping(
        &self,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        exclude_booking_id: Option<Uuid>,
    ) -> CoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings \
             WHERE property_id = $1 \
               AND status NOT IN ('cancelled', 'rejected') \
               AND check_in < $3 AND check_out > $2 \
               AND ($4::uuid IS NULL OR id != $4)",
        )
        .bind(property_id)
        .bind(check_in)
        .bind(check_out)
        .bind(exclude_booking_id)
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;

        Ok(count)
    }

    async fn update_status(&self, id: Uuid, status: BookingStatus) -> CoreResult<Booking> {
        let sql = format!(
            "UPDATE bookings AS b SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        );

        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| CoreError::NotFound("Booking not found.".to_string()))?;

        row.into_booking()
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        payment_id: Uuid,
        method: PaymentMethod,
    ) -> CoreResult<Booking> {
        // Conditional flip: only an unpaid booking settles, so two racing
        // payment attempts cannot both claim it.
        let sql = format!(
            "UPDATE bookings AS b SET \
                payment_status = 'paid', status = 'confirmed', \
                payment_id = $2, payment_method = $3, updated_at = NOW() \
             WHERE id = $1 AND payment_status <> 'paid' RETURNING {BOOKING_COLUMNS}"
        );

        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .bind(payment_id)
            .bind(method.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;

        match row {
            Some(row) => row.into_booking(),
            None => {
                let exists: Option<(Uuid,)> =
                    sqlx::query_as("SELECT id FROM bookings WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(internal)?;
                if exists.is_some() {
                    Err(CoreError::ValidationError(
                        "Booking already paid.".to_string(),
                    ))
                } else {
                    Err(CoreError::NotFound("Booking not found.".to_string()))
                }
            }
        }
    }

    async fn mark_refunded(&self, id: Uuid) -> CoreResult<Booking> {
        let sql = format!(
            "UPDATE bookings AS b SET \
                payment_status = 'refunded', status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        );

        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| CoreError::NotFound("Booking not found.".to_string()))?;

        row.into_booking()
    }

    async fn stats(&self, window: StatsWindow) -> CoreResult<BookingStats> {
        #[derive(sqlx::FromRow)]
        struct StatsRow {
            total: i64,
            revenue: Decimal,
            pending: i64,
            confirmed: i64,
        }

        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT COUNT(*) AS total, \
                    COALESCE(SUM(b.total_price) FILTER (WHERE b.payment_status = 'paid'), 0) AS revenue, \
                    COUNT(*) FILTER (WHERE b.status = 'pending') AS pending, \
                    COUNT(*) FILTER (WHERE b.status = 'confirmed') AS confirmed \
             FROM bookings b \
             LEFT JOIN properties p ON b.property_id = p.id \
             WHERE ($1::uuid IS NULL OR p.merchant_id = $1) \
               AND ($2::timestamptz IS NULL OR b.created_at >= $2) \
               AND ($3::timestamptz IS NULL OR b.created_at <= $3)",
        )
        .bind(window.merchant_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;

        Ok(BookingStats {
            total: row.total,
            revenue: row.revenue,
            pending: row.pending,
            confirmed: row.confirmed,
        })
    }
}
