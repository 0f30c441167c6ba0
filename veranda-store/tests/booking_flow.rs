use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use uuid::Uuid;

use veranda_booking::gateway::{CreditCardGateway, GatewayRegistry};
use veranda_booking::manager::{BookingManager, CreateBooking};
use veranda_booking::models::{
    Booking, BookingPaymentStatus, BookingStatus, PaymentMethod, PaymentStatus,
};
use veranda_booking::payments::{PaymentProcessor, PaymentRequest};
use veranda_booking::repository::{BookingRepository, PaymentRepository, StatsWindow};
use veranda_catalog::property::{NewProperty, PropertyRepository, PropertyStatus};
use veranda_core::identity::{NewUser, Role};
use veranda_core::repository::UserRepository;
use veranda_core::CoreError;
use veranda_store::InMemoryStore;

struct Harness {
    store: Arc<InMemoryStore>,
    manager: BookingManager,
    processor: PaymentProcessor,
    customer: Uuid,
    other_customer: Uuid,
    property: Uuid,
    free_property: Uuid,
}

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn card_payment(number: &str) -> PaymentRequest {
    PaymentRequest {
        method: "credit_card".to_string(),
        fields: serde_json::json!({ "method": "credit_card", "card_number": number }),
    }
}

async fn new_user(store: &Arc<InMemoryStore>, email: &str, role: Role) -> Uuid {
    let users: Arc<dyn UserRepository> = store.clone();
    users
        .create(NewUser {
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            name: "Test User".to_string(),
            role,
            phone: None,
        })
        .await
        .unwrap()
        .id
}

async fn new_active_property(
    store: &Arc<InMemoryStore>,
    merchant_id: Uuid,
    name: &str,
    price: rust_decimal::Decimal,
    max_guests: i32,
) -> Uuid {
    let properties: Arc<dyn PropertyRepository> = store.clone();
    let property = properties
        .create(NewProperty {
            merchant_id,
            name: name.to_string(),
            description: None,
            location: "Test Location".to_string(),
            address: None,
            price_per_night: price,
            currency: "USD".to_string(),
            bedrooms: 1,
            bathrooms: 1,
            max_guests,
            amenities: Vec::new(),
            images: Vec::new(),
        })
        .await
        .unwrap();
    properties
        .set_status(property.id, PropertyStatus::Active)
        .await
        .unwrap();
    property.id
}

async fn harness() -> Harness {
    harness_with_gateway_timing(Duration::ZERO, Duration::from_secs(1)).await
}

async fn harness_with_gateway_timing(latency: Duration, timeout: Duration) -> Harness {
    let store = Arc::new(InMemoryStore::new());

    let customer = new_user(&store, "guest@example.com", Role::Customer).await;
    let other_customer = new_user(&store, "other@example.com", Role::Customer).await;
    let merchant = new_user(&store, "owner@example.com", Role::Merchant).await;

    let property = new_active_property(&store, merchant, "Seaside Flat", dec!(100), 2).await;
    let free_property =
        new_active_property(&store, merchant, "Demo Cottage", dec!(0), 4).await;

    let properties: Arc<dyn PropertyRepository> = store.clone();
    let bookings: Arc<dyn BookingRepository> = store.clone();
    let payments: Arc<dyn PaymentRepository> = store.clone();

    let manager = BookingManager::new(properties, bookings.clone());
    let gateways = Arc::new(GatewayRegistry::with_simulators(latency));
    let processor = PaymentProcessor::new(bookings, payments, gateways, timeout);

    Harness {
        store,
        manager,
        processor,
        customer,
        other_customer,
        property,
        free_property,
    }
}

impl Harness {
    fn stay(&self, check_in: &str, check_out: &str) -> CreateBooking {
        CreateBooking {
            property_id: self.property,
            check_in: d(check_in),
            check_out: d(check_out),
            guests: 2,
            special_requests: None,
        }
    }

    async fn book(&self, check_in: &str, check_out: &str) -> Booking {
        self.manager
            .create(self.stay(check_in, check_out), self.customer)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn availability_quote_is_idempotent_and_priced() {
    let h = harness().await;

    let quote = h
        .manager
        .check_availability(h.property, d("2025-03-01"), d("2025-03-04"), None)
        .await
        .unwrap();
    assert!(quote.available);
    assert_eq!(quote.nights, 3);
    assert_eq!(quote.total_price, dec!(300));
    assert_eq!(quote.currency, "USD");

    // No writes happened; a second identical call returns the same answer.
    let again = h
        .manager
        .check_availability(h.property, d("2025-03-01"), d("2025-03-04"), None)
        .await
        .unwrap();
    assert!(again.available);
    assert_eq!(again.total_price, quote.total_price);
}

#[tokio::test]
async fn availability_rejects_inverted_dates_and_unknown_property() {
    let h = harness().await;

    let err = h
        .manager
        .check_availability(h.property, d("2025-03-04"), d("2025-03-01"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));

    let err = h
        .manager
        .check_availability(Uuid::new_v4(), d("2025-03-01"), d("2025-03-04"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn booking_created_pending_unpaid_with_derived_total() {
    let h = harness().await;

    let booking = h.book("2025-03-01", "2025-03-04").await;
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Unpaid);
    assert_eq!(booking.total_price, dec!(300));
    assert!(booking.payment_id.is_none());
}

#[tokio::test]
async fn overlapping_booking_conflicts_back_to_back_does_not() {
    let h = harness().await;
    h.book("2025-03-01", "2025-03-04").await;

    let err = h
        .manager
        .create(h.stay("2025-03-03", "2025-03-05"), h.other_customer)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let quote = h
        .manager
        .check_availability(h.property, d("2025-03-03"), d("2025-03-05"), None)
        .await
        .unwrap();
    assert!(!quote.available);

    // Checkout day equals next check-in day: allowed.
    h.manager
        .create(h.stay("2025-03-04", "2025-03-07"), h.other_customer)
        .await
        .unwrap();
}

#[tokio::test]
async fn guest_count_over_property_limit_is_rejected() {
    let h = harness().await;

    let mut stay = h.stay("2025-03-01", "2025-03-04");
    stay.guests = 3; // property sleeps 2
    let err = h.manager.create(stay, h.customer).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
}

#[tokio::test]
async fn unapproved_property_is_not_bookable() {
    let h = harness().await;
    let properties: Arc<dyn PropertyRepository> = h.store.clone();

    // Freshly created listings stay pending until approved.
    let merchant = new_user(&h.store, "owner2@example.com", Role::Merchant).await;
    let pending = properties
        .create(NewProperty {
            merchant_id: merchant,
            name: "Unapproved Cabin".to_string(),
            description: None,
            location: "Backwoods".to_string(),
            address: None,
            price_per_night: dec!(50),
            currency: "USD".to_string(),
            bedrooms: 1,
            bathrooms: 1,
            max_guests: 2,
            amenities: Vec::new(),
            images: Vec::new(),
        })
        .await
        .unwrap();
    assert_eq!(pending.status, PropertyStatus::Pending);

    let err = h
        .manager
        .create(
            CreateBooking {
                property_id: pending.id,
                check_in: d("2025-03-01"),
                check_out: d("2025-03-04"),
                guests: 1,
                special_requests: None,
            },
            h.customer,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn cancelled_booking_releases_its_dates() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;

    h.manager
        .cancel(booking.id, h.customer, Role::Customer)
        .await
        .unwrap();

    // Same range is free again.
    h.manager
        .create(h.stay("2025-03-01", "2025-03-04"), h.other_customer)
        .await
        .unwrap();
}

#[tokio::test]
async fn credit_card_payment_confirms_booking_and_rejects_double_pay() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;

    let receipt = h
        .processor
        .process(booking.id, h.customer, card_payment("4242424242421234"))
        .await
        .unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.payment.status, PaymentStatus::Completed);
    assert_eq!(receipt.payment.amount, dec!(300));
    assert!(receipt
        .payment
        .transaction_id
        .as_deref()
        .unwrap()
        .starts_with("TXN_"));

    let bookings: Arc<dyn BookingRepository> = h.store.clone();
    let paid = bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(paid.status, BookingStatus::Confirmed);
    assert_eq!(paid.payment_status, BookingPaymentStatus::Paid);
    assert_eq!(paid.payment_id, Some(receipt.payment.id));

    let err = h
        .processor
        .process(booking.id, h.customer, card_payment("4242424242421234"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
}

#[tokio::test]
async fn declined_card_persists_failed_attempt_and_allows_retry() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;

    let receipt = h
        .processor
        .process(booking.id, h.customer, card_payment("4242424240000000"))
        .await
        .unwrap();
    assert!(!receipt.success);
    assert_eq!(receipt.message, "Card declined");
    assert_eq!(receipt.payment.status, PaymentStatus::Failed);
    assert!(receipt.payment.transaction_id.is_none());

    let bookings: Arc<dyn BookingRepository> = h.store.clone();
    let unchanged = bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, BookingStatus::Pending);
    assert_eq!(unchanged.payment_status, BookingPaymentStatus::Unpaid);

    // Failed attempts accumulate; a later good card still settles.
    let retry = h
        .processor
        .process(booking.id, h.customer, card_payment("4242424242421234"))
        .await
        .unwrap();
    assert!(retry.success);

    let attempts = h.processor.list_by_booking(booking.id).await.unwrap();
    assert_eq!(attempts.len(), 2);
}

#[tokio::test]
async fn zero_priced_booking_settles_as_free_whatever_the_method() {
    let h = harness().await;
    let booking = h
        .manager
        .create(
            CreateBooking {
                property_id: h.free_property,
                check_in: d("2025-03-01"),
                check_out: d("2025-03-04"),
                guests: 2,
                special_requests: None,
            },
            h.customer,
        )
        .await
        .unwrap();
    assert_eq!(booking.total_price, dec!(0));

    let receipt = h
        .processor
        .process(booking.id, h.customer, card_payment("4242424242421234"))
        .await
        .unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.payment.amount, dec!(0));
    assert_eq!(receipt.payment.method, PaymentMethod::Free);
    assert_eq!(receipt.payment.status, PaymentStatus::Completed);

    let bookings: Arc<dyn BookingRepository> = h.store.clone();
    let confirmed = bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert_eq!(confirmed.payment_status, BookingPaymentStatus::Paid);
}

#[tokio::test]
async fn free_method_is_rejected_for_priced_bookings() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;

    let err = h
        .processor
        .process(
            booking.id,
            h.customer,
            PaymentRequest {
                method: "free".to_string(),
                fields: serde_json::json!({ "method": "free" }),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
}

#[tokio::test]
async fn unknown_method_and_wrong_payer_are_rejected() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;

    let err = h
        .processor
        .process(
            booking.id,
            h.customer,
            PaymentRequest {
                method: "venmo".to_string(),
                fields: serde_json::json!({}),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));

    let err = h
        .processor
        .process(booking.id, h.other_customer, card_payment("4242424242421234"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}

#[tokio::test]
async fn slow_gateway_times_out_into_failed_payment() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;

    let bookings: Arc<dyn BookingRepository> = h.store.clone();
    let payments: Arc<dyn PaymentRepository> = h.store.clone();
    let mut gateways = GatewayRegistry::with_simulators(Duration::ZERO);
    gateways.register(
        PaymentMethod::CreditCard,
        Arc::new(CreditCardGateway::new(Duration::from_millis(200))),
    );
    let processor = PaymentProcessor::new(
        bookings.clone(),
        payments,
        Arc::new(gateways),
        Duration::from_millis(20),
    );

    let receipt = processor
        .process(booking.id, h.customer, card_payment("4242424242421234"))
        .await
        .unwrap();
    assert!(!receipt.success);
    assert_eq!(receipt.payment.status, PaymentStatus::Failed);
    assert_eq!(
        receipt.payment.payment_data["code"].as_str(),
        Some("GATEWAY_TIMEOUT")
    );

    let unchanged = bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(unchanged.payment_status, BookingPaymentStatus::Unpaid);
}

#[tokio::test]
async fn cancel_rules_owner_admin_and_completed() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;

    // A stranger cannot cancel.
    let err = h
        .manager
        .cancel(booking.id, h.other_customer, Role::Customer)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    // Owner cancels a pending booking; payment status is untouched.
    let cancelled = h
        .manager
        .cancel(booking.id, h.customer, Role::Customer)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment_status, BookingPaymentStatus::Unpaid);

    // A completed stay cannot be cancelled.
    let second = h.book("2025-04-01", "2025-04-03").await;
    h.manager
        .update_status(second.id, BookingStatus::Confirmed)
        .await
        .unwrap();
    h.manager
        .update_status(second.id, BookingStatus::Completed)
        .await
        .unwrap();
    let err = h
        .manager
        .cancel(second.id, h.customer, Role::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
}

#[tokio::test]
async fn cancelling_a_paid_booking_does_not_touch_payment_status() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;
    h.processor
        .process(booking.id, h.customer, card_payment("4242424242421234"))
        .await
        .unwrap();

    let cancelled = h
        .manager
        .cancel(booking.id, h.customer, Role::Customer)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    // Known asymmetry: no refund is triggered by cancellation.
    assert_eq!(cancelled.payment_status, BookingPaymentStatus::Paid);
}

#[tokio::test]
async fn status_transitions_follow_the_table() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;

    // pending cannot jump straight to completed
    let err = h
        .manager
        .update_status(booking.id, BookingStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));

    h.manager
        .update_status(booking.id, BookingStatus::Confirmed)
        .await
        .unwrap();
    let done = h
        .manager
        .update_status(booking.id, BookingStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.status, BookingStatus::Completed);

    // completed is terminal
    let err = h
        .manager
        .update_status(booking.id, BookingStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
}

#[tokio::test]
async fn refund_request_rules() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;
    let receipt = h
        .processor
        .process(booking.id, h.customer, card_payment("4242424242421234"))
        .await
        .unwrap();

    // Only the payer may ask.
    let err = h
        .processor
        .request_refund(receipt.payment.id, h.other_customer, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let pending = h
        .processor
        .request_refund(
            receipt.payment.id,
            h.customer,
            Some("Change of plans".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(pending.status, PaymentStatus::RefundPending);
    assert_eq!(
        pending.payment_data["refund_reason"].as_str(),
        Some("Change of plans")
    );

    // Now that it is no longer completed, a second request is invalid.
    let err = h
        .processor
        .request_refund(receipt.payment.id, h.customer, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
}

#[tokio::test]
async fn approved_refund_cascades_to_booking_declined_restores_payment() {
    let h = harness().await;
    let booking = h.book("2025-03-01", "2025-03-04").await;
    let receipt = h
        .processor
        .process(booking.id, h.customer, card_payment("4242424242421234"))
        .await
        .unwrap();
    h.processor
        .request_refund(receipt.payment.id, h.customer, None)
        .await
        .unwrap();

    // Declined: payment back to completed, booking untouched.
    let declined = h
        .processor
        .process_refund(receipt.payment.id, false)
        .await
        .unwrap();
    assert_eq!(declined.status, PaymentStatus::Completed);
    let bookings: Arc<dyn BookingRepository> = h.store.clone();
    let unchanged = bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(unchanged.payment_status, BookingPaymentStatus::Paid);

    // Approved: payment refunded and the booking cascades.
    h.processor
        .request_refund(receipt.payment.id, h.customer, None)
        .await
        .unwrap();
    let refunded = h
        .processor
        .process_refund(receipt.payment.id, true)
        .await
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);

    let cascaded = bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(cascaded.status, BookingStatus::Cancelled);
    assert_eq!(cascaded.payment_status, BookingPaymentStatus::Refunded);
}

#[tokio::test]
async fn stats_aggregate_by_status_and_amount() {
    let h = harness().await;
    let paid = h.book("2025-03-01", "2025-03-04").await;
    h.book("2025-05-01", "2025-05-03").await;
    h.processor
        .process(paid.id, h.customer, card_payment("4242424242421234"))
        .await
        .unwrap();

    let booking_stats = h.manager.stats(StatsWindow::default()).await.unwrap();
    assert_eq!(booking_stats.total, 2);
    assert_eq!(booking_stats.pending, 1);
    assert_eq!(booking_stats.confirmed, 1);
    assert_eq!(booking_stats.revenue, dec!(300));

    let payment_stats = h.processor.stats(StatsWindow::default()).await.unwrap();
    assert_eq!(payment_stats.total, 1);
    assert_eq!(payment_stats.completed, 1);
    assert_eq!(payment_stats.completed_amount, dec!(300));
    assert_eq!(payment_stats.failed, 0);
}
