use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use veranda_api::middleware::auth::Claims;
use veranda_api::state::{AppState, AuthConfig};
use veranda_api::app;
use veranda_booking::repository::{BookingRepository, PaymentRepository};
use veranda_booking::GatewayRegistry;
use veranda_catalog::property::{NewProperty, PropertyRepository, PropertyStatus};
use veranda_core::identity::{NewUser, Role, User};
use veranda_core::repository::UserRepository;
use veranda_store::InMemoryStore;

const TEST_SECRET: &str = "test-secret";

struct TestApp {
    app: Router,
    customer: User,
    merchant: User,
    admin: User,
    property_id: Uuid,
    free_property_id: Uuid,
}

fn token_for(user: &User) -> String {
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn create_user(store: &Arc<InMemoryStore>, email: &str, role: Role) -> User {
    let users: Arc<dyn UserRepository> = store.clone();
    users
        .create(NewUser {
            email: email.to_string(),
            // low cost keeps the suite fast
            password_hash: bcrypt::hash("secret123", 4).unwrap(),
            name: "Test User".to_string(),
            role,
            phone: None,
        })
        .await
        .unwrap()
}

async fn create_active_property(
    store: &Arc<InMemoryStore>,
    merchant_id: Uuid,
    name: &str,
    price: Decimal,
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

async fn setup() -> TestApp {
    let store = Arc::new(InMemoryStore::new());

    let customer = create_user(&store, "guest@example.com", Role::Customer).await;
    let merchant = create_user(&store, "owner@example.com", Role::Merchant).await;
    let admin = create_user(&store, "admin@example.com", Role::Admin).await;

    let property_id =
        create_active_property(&store, merchant.id, "Seaside Flat", dec!(100), 2).await;
    let free_property_id =
        create_active_property(&store, merchant.id, "Demo Cottage", dec!(0), 4).await;

    let users: Arc<dyn UserRepository> = store.clone();
    let properties: Arc<dyn PropertyRepository> = store.clone();
    let bookings: Arc<dyn BookingRepository> = store.clone();
    let payments: Arc<dyn PaymentRepository> = store.clone();

    let state = AppState::new(
        users,
        properties,
        bookings,
        payments,
        Arc::new(GatewayRegistry::with_simulators(Duration::ZERO)),
        Duration::from_secs(1),
        None,
        AuthConfig {
            secret: TEST_SECRET.to_string(),
            expiration: 3600,
        },
    );

    TestApp {
        app: app(state),
        customer,
        merchant,
        admin,
        property_id,
        free_property_id,
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn money(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn check_availability_quotes_the_stay() {
    let t = setup().await;

    let uri = format!(
        "/v1/bookings/check-availability?property_id={}&check_in=2025-03-01&check_out=2025-03-04",
        t.property_id
    );
    let (status, body) = send(&t.app, Method::GET, &uri, None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], json!(true));
    assert_eq!(body["nights"], json!(3));
    assert_eq!(money(&body["total_price"]), dec!(300));
}

#[tokio::test]
async fn booking_and_payment_happy_path() {
    let t = setup().await;
    let token = token_for(&t.customer);

    let (status, booking) = send(
        &t.app,
        Method::POST,
        "/v1/bookings",
        Some(&token),
        Some(json!({
            "property_id": t.property_id,
            "check_in": "2025-03-01",
            "check_out": "2025-03-04",
            "guests": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], json!("pending"));
    assert_eq!(booking["payment_status"], json!("unpaid"));
    assert_eq!(money(&booking["total_price"]), dec!(300));

    let booking_id = booking["id"].as_str().unwrap();
    let (status, receipt) = send(
        &t.app,
        Method::POST,
        &format!("/v1/bookings/{booking_id}/pay"),
        Some(&token),
        Some(json!({ "method": "credit_card", "card_number": "4242424242421234" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["success"], json!(true));
    assert_eq!(receipt["data"]["status"], json!("completed"));

    let (status, paid) = send(
        &t.app,
        Method::GET,
        &format!("/v1/bookings/{booking_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], json!("confirmed"));
    assert_eq!(paid["payment_status"], json!("paid"));

    // Second attempt: already paid.
    let (status, err) = send(
        &t.app,
        Method::POST,
        &format!("/v1/bookings/{booking_id}/pay"),
        Some(&token),
        Some(json!({ "method": "credit_card", "card_number": "4242424242421234" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], json!("Booking already paid."));
}

#[tokio::test]
async fn overlapping_booking_returns_conflict() {
    let t = setup().await;
    let token = token_for(&t.customer);

    let body = json!({
        "property_id": t.property_id,
        "check_in": "2025-03-01",
        "check_out": "2025-03-04",
        "guests": 1
    });
    let (status, _) = send(&t.app, Method::POST, "/v1/bookings", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, err) = send(
        &t.app,
        Method::POST,
        "/v1/bookings",
        Some(&token),
        Some(json!({
            "property_id": t.property_id,
            "check_in": "2025-03-03",
            "check_out": "2025-03-05",
            "guests": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], json!("Dates already reserved."));
}

#[tokio::test]
async fn guest_limit_is_enforced() {
    let t = setup().await;
    let token = token_for(&t.customer);

    let (status, err) = send(
        &t.app,
        Method::POST,
        "/v1/bookings",
        Some(&token),
        Some(json!({
            "property_id": t.property_id,
            "check_in": "2025-03-01",
            "check_out": "2025-03-04",
            "guests": 5
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], json!("Guest count exceeds property limit."));
}

#[tokio::test]
async fn declined_card_reports_failure_and_keeps_booking_pending() {
    let t = setup().await;
    let token = token_for(&t.customer);

    let (_, booking) = send(
        &t.app,
        Method::POST,
        "/v1/bookings",
        Some(&token),
        Some(json!({
            "property_id": t.property_id,
            "check_in": "2025-03-01",
            "check_out": "2025-03-04",
            "guests": 1
        })),
    )
    .await;
    let booking_id = booking["id"].as_str().unwrap();

    let (status, receipt) = send(
        &t.app,
        Method::POST,
        &format!("/v1/bookings/{booking_id}/pay"),
        Some(&token),
        Some(json!({ "method": "credit_card", "card_number": "4242424240000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(receipt["success"], json!(false));
    assert_eq!(receipt["message"], json!("Card declined"));
    assert_eq!(receipt["data"]["status"], json!("failed"));

    let (_, unchanged) = send(
        &t.app,
        Method::GET,
        &format!("/v1/bookings/{booking_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(unchanged["status"], json!("pending"));
    assert_eq!(unchanged["payment_status"], json!("unpaid"));
}

#[tokio::test]
async fn free_booking_settles_without_a_gateway() {
    let t = setup().await;
    let token = token_for(&t.customer);

    let (_, booking) = send(
        &t.app,
        Method::POST,
        "/v1/bookings",
        Some(&token),
        Some(json!({
            "property_id": t.free_property_id,
            "check_in": "2025-03-01",
            "check_out": "2025-03-04",
            "guests": 2
        })),
    )
    .await;
    let booking_id = booking["id"].as_str().unwrap();

    let (status, receipt) = send(
        &t.app,
        Method::POST,
        &format!("/v1/bookings/{booking_id}/pay"),
        Some(&token),
        Some(json!({ "method": "paypal" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["success"], json!(true));
    assert_eq!(receipt["data"]["method"], json!("free"));
    assert_eq!(money(&receipt["data"]["amount"]), dec!(0));
    assert!(receipt["data"]["transaction_id"]
        .as_str()
        .unwrap()
        .starts_with("FREE-"));
}

#[tokio::test]
async fn register_login_and_profile_flow() {
    let t = setup().await;

    let (status, profile) = send(
        &t.app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "name": "New Guest",
            "email": "New.Guest@Example.com",
            "password": "hunter22"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(profile["email"], json!("new.guest@example.com"));
    assert_eq!(profile["role"], json!("customer"));
    assert!(profile.get("password_hash").is_none());

    // Duplicate email conflicts.
    let (status, _) = send(
        &t.app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "name": "New Guest",
            "email": "new.guest@example.com",
            "password": "hunter22"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, auth) = send(
        &t.app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "email": "new.guest@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = auth["token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &t.app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "email": "new.guest@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, me) = send(&t.app, Method::GET, "/v1/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], json!("new.guest@example.com"));
}

#[tokio::test]
async fn merchant_listing_needs_admin_approval_to_go_public() {
    let t = setup().await;
    let merchant_token = token_for(&t.merchant);
    let admin_token = token_for(&t.admin);

    let (status, property) = send(
        &t.app,
        Method::POST,
        "/v1/properties",
        Some(&merchant_token),
        Some(json!({
            "name": "Hillside Retreat",
            "location": "Highlands",
            "price_per_night": "180",
            "max_guests": 4
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(property["status"], json!("pending"));
    let property_id = property["id"].as_str().unwrap();

    // Not public while pending.
    let (_, listed) = send(&t.app, Method::GET, "/v1/properties", None, None).await;
    assert!(!listed
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["id"] == property["id"]));

    let (status, approved) = send(
        &t.app,
        Method::POST,
        &format!("/v1/properties/{property_id}/approve"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], json!("active"));

    let (_, listed) = send(&t.app, Method::GET, "/v1/properties", None, None).await;
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["id"] == property["id"]));
}

#[tokio::test]
async fn admin_routes_are_guarded() {
    let t = setup().await;

    let (status, _) = send(&t.app, Method::GET, "/v1/admin/analytics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer_token = token_for(&t.customer);
    let (status, _) = send(
        &t.app,
        Method::GET,
        "/v1/admin/analytics",
        Some(&customer_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = token_for(&t.admin);
    let (status, analytics) = send(
        &t.app,
        Method::GET,
        "/v1/admin/analytics",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(analytics["properties"]["total"].as_i64().unwrap() >= 2);
    assert_eq!(analytics["users"]["breakdown"]["admin"], json!(1));
}

#[tokio::test]
async fn owner_cancels_pending_booking() {
    let t = setup().await;
    let token = token_for(&t.customer);

    let (_, booking) = send(
        &t.app,
        Method::POST,
        "/v1/bookings",
        Some(&token),
        Some(json!({
            "property_id": t.property_id,
            "check_in": "2025-03-01",
            "check_out": "2025-03-04",
            "guests": 1
        })),
    )
    .await;
    let booking_id = booking["id"].as_str().unwrap();

    let (status, cancelled) = send(
        &t.app,
        Method::POST,
        &format!("/v1/bookings/{booking_id}/cancel"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], json!("cancelled"));
    assert_eq!(cancelled["payment_status"], json!("unpaid"));
}

#[tokio::test]
async fn merchant_updates_status_of_bookings_on_their_property() {
    let t = setup().await;
    let customer_token = token_for(&t.customer);
    let merchant_token = token_for(&t.merchant);

    let (_, booking) = send(
        &t.app,
        Method::POST,
        "/v1/bookings",
        Some(&customer_token),
        Some(json!({
            "property_id": t.property_id,
            "check_in": "2025-03-01",
            "check_out": "2025-03-04",
            "guests": 1
        })),
    )
    .await;
    let booking_id = booking["id"].as_str().unwrap();

    // Customers cannot drive the status machine.
    let (status, _) = send(
        &t.app,
        Method::PUT,
        &format!("/v1/bookings/{booking_id}/status"),
        Some(&customer_token),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Illegal jump is rejected.
    let (status, _) = send(
        &t.app,
        Method::PUT,
        &format!("/v1/bookings/{booking_id}/status"),
        Some(&merchant_token),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = send(
        &t.app,
        Method::PUT,
        &format!("/v1/bookings/{booking_id}/status"),
        Some(&merchant_token),
        Some(json!({ "status": "rejected" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], json!("rejected"));
}

#[tokio::test]
async fn refund_request_and_admin_approval_cascade() {
    let t = setup().await;
    let token = token_for(&t.customer);
    let admin_token = token_for(&t.admin);

    let (_, booking) = send(
        &t.app,
        Method::POST,
        "/v1/bookings",
        Some(&token),
        Some(json!({
            "property_id": t.property_id,
            "check_in": "2025-03-01",
            "check_out": "2025-03-04",
            "guests": 1
        })),
    )
    .await;
    let booking_id = booking["id"].as_str().unwrap();

    let (_, receipt) = send(
        &t.app,
        Method::POST,
        &format!("/v1/bookings/{booking_id}/pay"),
        Some(&token),
        Some(json!({ "method": "credit_card", "card_number": "4242424242421234" })),
    )
    .await;
    let payment_id = receipt["data"]["id"].as_str().unwrap();

    let (status, pending) = send(
        &t.app,
        Method::POST,
        &format!("/v1/payments/{payment_id}/refund"),
        Some(&token),
        Some(json!({ "reason": "Trip cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["status"], json!("refund_pending"));

    let (status, decision) = send(
        &t.app,
        Method::POST,
        &format!("/v1/admin/payments/{payment_id}/refund"),
        Some(&admin_token),
        Some(json!({ "approved": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["data"]["status"], json!("refunded"));

    let (_, cascaded) = send(
        &t.app,
        Method::GET,
        &format!("/v1/bookings/{booking_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(cascaded["status"], json!("cancelled"));
    assert_eq!(cascaded["payment_status"], json!("refunded"));
}
