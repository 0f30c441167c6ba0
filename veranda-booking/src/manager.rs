use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use veranda_catalog::availability::{
    nights_between, stay_price, AvailabilityQuote, PropertySummary,
};
use veranda_catalog::property::{Property, PropertyRepository, PropertyStatus};
use veranda_core::identity::Role;
use veranda_core::repository::Page;
use veranda_core::{CoreError, CoreResult};

use crate::models::{Booking, BookingStatus, NewBooking};
use crate::repository::{BookingFilter, BookingRepository, BookingStats, StatsWindow};

/// Parameters for creating a booking. The total price is never taken from
/// the caller; it is derived from the availability quote.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    pub special_requests: Option<String>,
}

/// Manages booking lifecycle and state transitions
pub struct BookingManager {
    properties: Arc<dyn PropertyRepository>,
    bookings: Arc<dyn BookingRepository>,
}

impl BookingManager {
    pub fn new(
        properties: Arc<dyn PropertyRepository>,
        bookings: Arc<dyn BookingRepository>,
    ) -> Self {
        Self {
            properties,
            bookings,
        }
    }

    /// Pure read: is the date range free, and what would the stay cost?
    pub async fn check_availability(
        &self,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        exclude_booking_id: Option<Uuid>,
    ) -> CoreResult<AvailabilityQuote> {
        if check_in >= check_out {
            return Err(CoreError::ValidationError(
                "Check-out must be after check-in.".to_string(),
            ));
        }

        let property = self
            .properties
            .find(property_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Property not found.".to_string()))?;

        let conflicts = self
            .bookings
            .count_overlapping(property_id, check_in, check_out, exclude_booking_id)
            .await?;

        Ok(Self::quote(&property, check_in, check_out, conflicts == 0))
    }

    /// Create a new booking in pending/unpaid state.
    pub async fn create(&self, req: CreateBooking, user_id: Uuid) -> CoreResult<Booking> {
        if req.check_in >= req.check_out {
            return Err(CoreError::ValidationError(
                "Check-out must be after check-in.".to_string(),
            ));
        }

        let property = self
            .properties
            .find(req.property_id)
            .await?
            .filter(|p| p.status == PropertyStatus::Active)
            .ok_or_else(|| CoreError::NotFound("Property unavailable.".to_string()))?;

        if req.guests > property.max_guests {
            return Err(CoreError::ValidationError(
                "Guest count exceeds property limit.".to_string(),
            ));
        }

        let conflicts = self
            .bookings
            .count_overlapping(req.property_id, req.check_in, req.check_out, None)
            .await?;
        if conflicts > 0 {
            return Err(CoreError::Conflict("Dates already reserved.".to_string()));
        }

        let quote = Self::quote(&property, req.check_in, req.check_out, true);

        // The repository re-runs the overlap check inside its own
        // serialization boundary; a lost race still comes back as Conflict.
        let booking = self
            .bookings
            .create(NewBooking {
                property_id: property.id,
                user_id,
                check_in: req.check_in,
                check_out: req.check_out,
                guests: req.guests,
                total_price: quote.total_price,
                currency: property.currency.clone(),
                special_requests: req.special_requests,
            })
            .await?;

        info!(booking_id = %booking.id, property_id = %property.id, "Booking created");
        Ok(booking)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .find(id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Booking not found.".to_string()))
    }

    pub async fn list(&self, filter: BookingFilter, page: Page) -> CoreResult<Vec<Booking>> {
        self.bookings.list(filter, page).await
    }

    /// Move a booking to `new_status`, subject to the transition table.
    pub async fn update_status(&self, id: Uuid, new_status: BookingStatus) -> CoreResult<Booking> {
        let booking = self.get(id).await?;

        if !booking.status.can_transition_to(new_status) {
            return Err(CoreError::ValidationError(format!(
                "Invalid status transition from {} to {}",
                booking.status, new_status
            )));
        }

        self.bookings.update_status(id, new_status).await
    }

    /// Cancel a booking on behalf of its owner or an admin. Payment status
    /// is deliberately left untouched; refunds are a separate flow.
    pub async fn cancel(&self, id: Uuid, actor_id: Uuid, actor_role: Role) -> CoreResult<Booking> {
        let booking = self.get(id).await?;

        if booking.user_id != actor_id && actor_role != Role::Admin {
            return Err(CoreError::Forbidden(
                "Not authorized to cancel this booking.".to_string(),
            ));
        }

        if booking.status == BookingStatus::Completed {
            return Err(CoreError::ValidationError(
                "Cannot cancel completed booking.".to_string(),
            ));
        }

        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(CoreError::ValidationError(format!(
                "Invalid status transition from {} to {}",
                booking.status,
                BookingStatus::Cancelled
            )));
        }

        self.bookings.update_status(id, BookingStatus::Cancelled).await
    }

    pub async fn stats(&self, window: StatsWindow) -> CoreResult<BookingStats> {
        self.bookings.stats(window).await
    }

    fn quote(
        property: &Property,
        check_in: NaiveDate,
        check_out: NaiveDate,
        available: bool,
    ) -> AvailabilityQuote {
        let nights = nights_between(check_in, check_out);
        AvailabilityQuote {
            available,
            nights,
            total_price: stay_price(property.price_per_night, nights),
            currency: property.currency.clone(),
            property: PropertySummary {
                id: property.id,
                name: property.name.clone(),
                price_per_night: property.price_per_night,
                currency: property.currency.clone(),
            },
        }
    }
}
