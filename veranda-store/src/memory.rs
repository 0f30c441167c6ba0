use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use veranda_booking::models::{
    Booking, BookingPaymentStatus, BookingStatus, NewBooking, NewPayment, Payment, PaymentMethod,
    PaymentStatus,
};
use veranda_booking::repository::{
    BookingFilter, BookingRepository, BookingStats, PaymentFilter, PaymentRepository,
    PaymentStats, StatsWindow,
};
use veranda_catalog::availability::ranges_overlap;
use veranda_catalog::property::{
    NewProperty, Property, PropertyFilter, PropertyRepository, PropertyStats, PropertyStatus,
    PropertyUpdate,
};
use veranda_core::identity::{NewUser, ProfileUpdate, Role, User};
use veranda_core::repository::{Page, UserRepository};
use veranda_core::{CoreError, CoreResult};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    properties: HashMap<Uuid, Property>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
}

/// In-memory backend. Implements the same repository contracts as the
/// Postgres store; mutations run under the write lock, so the booking
/// overlap check and insert are trivially serialized.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demo fixtures so the server is usable without a database: one user
    /// per role and a few active listings owned by the merchant, including
    /// a zero-priced property for exercising the free-booking flow. All
    /// users share the supplied password hash.
    pub async fn seed_demo_data(&self, password_hash: &str) {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let mut user = |email: &str, name: &str, role: Role| {
            let record = User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                name: name.to_string(),
                role,
                phone: None,
                avatar: None,
                created_at: now,
                updated_at: now,
            };
            let id = record.id;
            state.users.insert(id, record);
            id
        };

        user("user@example.com", "John Traveler", Role::Customer);
        user("admin@example.com", "Admin User", Role::Admin);
        let merchant_id = user("merchant@example.com", "Villa Owner", Role::Merchant);

        let listings = [
            (
                "[FREE TRIAL] Cozy Demo Cottage",
                "Complimentary demo property for trying the full booking flow without charges.",
                "Demo Location",
                Decimal::ZERO,
                2,
                1,
                4,
                5.0,
            ),
            (
                "Oceanfront Paradise Villa",
                "Stunning oceanfront villa with private beach access and an infinity pool.",
                "Maldives",
                Decimal::from(2500),
                5,
                6,
                10,
                4.9,
            ),
            (
                "Santorini Cliffside Villa",
                "Whitewashed villa perched on the caldera with a sunset terrace.",
                "Santorini, Greece",
                Decimal::from(2200),
                3,
                3,
                6,
                4.8,
            ),
        ];

        for (name, description, location, price, bedrooms, bathrooms, max_guests, rating) in
            listings
        {
            let property = Property {
                id: Uuid::new_v4(),
                merchant_id,
                name: name.to_string(),
                description: Some(description.to_string()),
                location: location.to_string(),
                address: None,
                price_per_night: price,
                currency: "USD".to_string(),
                bedrooms,
                bathrooms,
                max_guests,
                amenities: Vec::new(),
                images: Vec::new(),
                rating,
                review_count: 0,
                status: PropertyStatus::Active,
                created_at: now,
                updated_at: now,
            };
            state.properties.insert(property.id, property);
        }

        info!("Seeded in-memory store with demo users and listings");
    }
}

fn paginate<T>(mut items: Vec<T>, page: Page) -> Vec<T> {
    let offset = page.offset.max(0) as usize;
    if offset >= items.len() {
        return Vec::new();
    }
    items.drain(..offset);
    items.truncate(page.limit.max(0) as usize);
    items
}

fn in_window(created_at: chrono::DateTime<Utc>, window: &StatsWindow) -> bool {
    if let Some(start) = window.start {
        if created_at < start {
            return false;
        }
    }
    if let Some(end) = window.end {
        if created_at > end {
            return false;
        }
    }
    true
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: NewUser) -> CoreResult<User> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.email == user.email) {
            return Err(CoreError::Conflict("Email already registered.".to_string()));
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role,
            phone: user.phone,
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> CoreResult<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("User not found.".to_string()))?;

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(avatar) = update.avatar {
            user.avatar = Some(avatar);
        }
        if let Some(hash) = update.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn list(&self, role: Option<Role>, page: Page) -> CoreResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(users, page))
    }
}

#[async_trait]
impl PropertyRepository for InMemoryStore {
    async fn create(&self, property: NewProperty) -> CoreResult<Property> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let record = Property {
            id: Uuid::new_v4(),
            merchant_id: property.merchant_id,
            name: property.name,
            description: property.description,
            location: property.location,
            address: property.address,
            price_per_night: property.price_per_night,
            currency: property.currency,
            bedrooms: property.bedrooms,
            bathrooms: property.bathrooms,
            max_guests: property.max_guests,
            amenities: property.amenities,
            images: property.images,
            rating: 0.0,
            review_count: 0,
            status: PropertyStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.properties.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: Uuid) -> CoreResult<Option<Property>> {
        Ok(self.state.read().await.properties.get(&id).cloned())
    }

    async fn list(&self, filter: PropertyFilter, page: Page) -> CoreResult<Vec<Property>> {
        let state = self.state.read().await;

        let matches = |p: &Property| {
            if let Some(status) = filter.status {
                if p.status != status {
                    return false;
                }
            }
            if let Some(merchant_id) = filter.merchant_id {
                if p.merchant_id != merchant_id {
                    return false;
                }
            }
            if let Some(location) = &filter.location {
                if !p.location.to_lowercase().contains(&location.to_lowercase()) {
                    return false;
                }
            }
            if let Some(min) = filter.min_price {
                if p.price_per_night < min {
                    return false;
                }
            }
            if let Some(max) = filter.max_price {
                if p.price_per_night > max {
                    return false;
                }
            }
            if let Some(guests) = filter.guests {
                if p.max_guests < guests {
                    return false;
                }
            }
            if let Some(search) = &filter.search {
                let needle = search.to_lowercase();
                let in_name = p.name.to_lowercase().contains(&needle);
                let in_description = p
                    .description
                    .as_ref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle));
                if !in_name && !in_description {
                    return false;
                }
            }
            true
        };

        let mut properties: Vec<Property> =
            state.properties.values().filter(|p| matches(p)).cloned().collect();
        properties.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(properties, page))
    }

    async fn featured(&self, limit: i64) -> CoreResult<Vec<Property>> {
        let state = self.state.read().await;
        let mut properties: Vec<Property> = state
            .properties
            .values()
            .filter(|p| p.status == PropertyStatus::Active)
            .cloned()
            .collect();
        properties.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.review_count.cmp(&a.review_count))
        });
        properties.truncate(limit.max(0) as usize);
        Ok(properties)
    }

    async fn update(&self, id: Uuid, update: PropertyUpdate) -> CoreResult<Property> {
        let mut state = self.state.write().await;
        let property = state
            .properties
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Property not found.".to_string()))?;

        if let Some(name) = update.name {
            property.name = name;
        }
        if let Some(description) = update.description {
            property.description = Some(description);
        }
        if let Some(location) = update.location {
            property.location = location;
        }
        if let Some(address) = update.address {
            property.address = Some(address);
        }
        if let Some(price) = update.price_per_night {
            property.price_per_night = price;
        }
        if let Some(bedrooms) = update.bedrooms {
            property.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = update.bathrooms {
            property.bathrooms = bathrooms;
        }
        if let Some(max_guests) = update.max_guests {
            property.max_guests = max_guests;
        }
        if let Some(amenities) = update.amenities {
            property.amenities = amenities;
        }
        if let Some(images) = update.images {
            property.images = images;
        }
        property.updated_at = Utc::now();

        Ok(property.clone())
    }

    async fn delete(&self, id: Uuid) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state
            .properties
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::NotFound("Property not found.".to_string()))
    }

    async fn set_status(&self, id: Uuid, status: PropertyStatus) -> CoreResult<Property> {
        let mut state = self.state.write().await;
        let property = state
            .properties
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Property not found.".to_string()))?;
        property.status = status;
        property.updated_at = Utc::now();
        Ok(property.clone())
    }

    async fn stats(&self, merchant_id: Option<Uuid>) -> CoreResult<PropertyStats> {
        let state = self.state.read().await;
        let scoped: Vec<&Property> = state
            .properties
            .values()
            .filter(|p| merchant_id.map_or(true, |m| p.merchant_id == m))
            .collect();

        Ok(PropertyStats {
            total: scoped.len() as i64,
            active: scoped
                .iter()
                .filter(|p| p.status == PropertyStatus::Active)
                .count() as i64,
            pending: scoped
                .iter()
                .filter(|p| p.status == PropertyStatus::Pending)
                .count() as i64,
        })
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn create(&self, booking: NewBooking) -> CoreResult<Booking> {
        // One write guard across the availability check and the insert:
        // concurrent creations cannot interleave between them.
        let mut state = self.state.write().await;

        if !state.properties.contains_key(&booking.property_id) {
            return Err(CoreError::NotFound("Property unavailable.".to_string()));
        }

        let conflict = state.bookings.values().any(|b| {
            b.property_id == booking.property_id
                && b.status.blocks_dates()
                && ranges_overlap(b.check_in, b.check_out, booking.check_in, booking.check_out)
        });
        if conflict {
            return Err(CoreError::Conflict("Dates already reserved.".to_string()));
        }

        let now = Utc::now();
        let record = Booking {
            id: Uuid::new_v4(),
            property_id: booking.property_id,
            user_id: booking.user_id,
            check_in: booking.check_in,
            check_out: booking.check_out,
            guests: booking.guests,
            total_price: booking.total_price,
            currency: booking.currency,
            status: BookingStatus::Pending,
            payment_status: BookingPaymentStatus::Unpaid,
            payment_id: None,
            payment_method: None,
            special_requests: booking.special_requests,
            created_at: now,
            updated_at: now,
        };
        state.bookings.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn list(&self, filter: BookingFilter, page: Page) -> CoreResult<Vec<Booking>> {
        let state = self.state.read().await;

        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| {
                filter.user_id.map_or(true, |u| b.user_id == u)
                    && filter.property_id.map_or(true, |p| b.property_id == p)
                    && filter.status.map_or(true, |s| b.status == s)
                    && filter.merchant_id.map_or(true, |m| {
                        state
                            .properties
                            .get(&b.property_id)
                            .is_some_and(|p| p.merchant_id == m)
                    })
            })
            .cloned()
            .collect();

        if filter.property_id.is_some() {
            bookings.sort_by(|a, b| a.check_in.cmp(&b.check_in));
        } else {
            bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Ok(paginate(bookings, page))
    }

    async fn count_overlapping(
        &self,
        property_id: Uuid,
        check_in: chrono::NaiveDate,
        check_out: chrono::NaiveDate,
        exclude_booking_id: Option<Uuid>,
    ) -> CoreResult<i64> {
        let state = self.state.read().await;
        let count = state
            .bookings
            .values()
            .filter(|b| {
                b.property_id == property_id
                    && exclude_booking_id.map_or(true, |e| b.id != e)
                    && b.status.blocks_dates()
                    && ranges_overlap(b.check_in, b.check_out, check_in, check_out)
            })
            .count();
        Ok(count as i64)
    }

    async fn update_status(&self, id: Uuid, status: BookingStatus) -> CoreResult<Booking> {
        let mut state = self.state.write().await;
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Booking not found.".to_string()))?;
        booking.status = status;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        payment_id: Uuid,
        method: PaymentMethod,
    ) -> CoreResult<Booking> {
        let mut state = self.state.write().await;
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Booking not found.".to_string()))?;
        // Checked again under the write lock so racing attempts cannot both
        // settle the booking.
        if booking.payment_status == BookingPaymentStatus::Paid {
            return Err(CoreError::ValidationError(
                "Booking already paid.".to_string(),
            ));
        }
        booking.payment_status = BookingPaymentStatus::Paid;
        booking.status = BookingStatus::Confirmed;
        booking.payment_id = Some(payment_id);
        booking.payment_method = Some(method);
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn mark_refunded(&self, id: Uuid) -> CoreResult<Booking> {
        let mut state = self.state.write().await;
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Booking not found.".to_string()))?;
        booking.payment_status = BookingPaymentStatus::Refunded;
        booking.status = BookingStatus::Cancelled;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn stats(&self, window: StatsWindow) -> CoreResult<BookingStats> {
        let state = self.state.read().await;

        let scoped: Vec<&Booking> = state
            .bookings
            .values()
            .filter(|b| {
                in_window(b.created_at, &window)
                    && window.merchant_id.map_or(true, |m| {
                        state
                            .properties
                            .get(&b.property_id)
                            .is_some_and(|p| p.merchant_id == m)
                    })
            })
            .collect();

        let revenue = scoped
            .iter()
            .filter(|b| b.payment_status == BookingPaymentStatus::Paid)
            .map(|b| b.total_price)
            .sum();

        Ok(BookingStats {
            total: scoped.len() as i64,
            revenue,
            pending: scoped
                .iter()
                .filter(|b| b.status == BookingStatus::Pending)
                .count() as i64,
            confirmed: scoped
                .iter()
                .filter(|b| b.status == BookingStatus::Confirmed)
                .count() as i64,
        })
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn create(&self, payment: NewPayment) -> CoreResult<Payment> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let record = Payment {
            id: Uuid::new_v4(),
            booking_id: payment.booking_id,
            user_id: payment.user_id,
            amount: payment.amount,
            currency: payment.currency,
            method: payment.method,
            status: payment.status,
            transaction_id: payment.transaction_id,
            payment_data: payment.payment_data,
            created_at: now,
            updated_at: now,
        };
        state.payments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: Uuid) -> CoreResult<Option<Payment>> {
        Ok(self.state.read().await.payments.get(&id).cloned())
    }

    async fn list_by_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn list(&self, filter: PaymentFilter, page: Page) -> CoreResult<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| {
                filter.user_id.map_or(true, |u| p.user_id == u)
                    && filter.status.map_or(true, |s| p.status == s)
                    && filter.method.map_or(true, |m| p.method == m)
            })
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(payments, page))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        data_patch: serde_json::Value,
    ) -> CoreResult<Payment> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Payment not found.".to_string()))?;

        payment.status = status;
        if let (Some(data), Some(patch)) =
            (payment.payment_data.as_object_mut(), data_patch.as_object())
        {
            for (key, value) in patch {
                data.insert(key.clone(), value.clone());
            }
        } else if data_patch.is_object() {
            payment.payment_data = data_patch;
        }
        payment.updated_at = Utc::now();

        Ok(payment.clone())
    }

    async fn stats(&self, window: StatsWindow) -> CoreResult<PaymentStats> {
        let state = self.state.read().await;
        let scoped: Vec<&Payment> = state
            .payments
            .values()
            .filter(|p| in_window(p.created_at, &window))
            .collect();

        let count_by = |status: PaymentStatus| {
            scoped.iter().filter(|p| p.status == status).count() as i64
        };
        let sum_by = |status: PaymentStatus| -> Decimal {
            scoped
                .iter()
                .filter(|p| p.status == status)
                .map(|p| p.amount)
                .sum()
        };

        Ok(PaymentStats {
            total: scoped.len() as i64,
            completed: count_by(PaymentStatus::Completed),
            completed_amount: sum_by(PaymentStatus::Completed),
            pending: count_by(PaymentStatus::Pending),
            pending_amount: sum_by(PaymentStatus::Pending),
            failed: count_by(PaymentStatus::Failed),
            refunded: count_by(PaymentStatus::Refunded),
        })
    }
}
