use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use veranda_api::{
    app,
    state::{AppState, AuthConfig},
};
use veranda_booking::repository::{BookingRepository, PaymentRepository};
use veranda_booking::GatewayRegistry;
use veranda_catalog::property::PropertyRepository;
use veranda_core::repository::UserRepository;
use veranda_store::booking_repo::PgBookingRepository;
use veranda_store::payment_repo::PgPaymentRepository;
use veranda_store::property_repo::PgPropertyRepository;
use veranda_store::user_repo::PgUserRepository;
use veranda_store::{DbClient, InMemoryStore, RedisClient};

type Repos = (
    Arc<dyn UserRepository>,
    Arc<dyn PropertyRepository>,
    Arc<dyn BookingRepository>,
    Arc<dyn PaymentRepository>,
);

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "veranda_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = veranda_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Veranda API on port {}", config.server.port);

    let (users, properties, bookings, payments): Repos = match config.database.url.as_deref() {
        Some(url) if !url.is_empty() => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .expect("Failed to connect to Postgres");
            db.migrate().await.expect("Failed to run migrations");

            (
                Arc::new(PgUserRepository::new(db.pool.clone())),
                Arc::new(PgPropertyRepository::new(db.pool.clone())),
                Arc::new(PgBookingRepository::new(db.pool.clone())),
                Arc::new(PgPaymentRepository::new(db.pool.clone())),
            )
        }
        _ => {
            tracing::warn!("No database URL configured; using in-memory store with demo data");
            let store = Arc::new(InMemoryStore::new());
            let demo_hash = bcrypt::hash("password123", bcrypt::DEFAULT_COST)
                .expect("Failed to hash demo password");
            store.seed_demo_data(&demo_hash).await;

            (
                store.clone(),
                store.clone(),
                store.clone(),
                store,
            )
        }
    };

    let redis = match config.redis.url.as_deref() {
        Some(url) if !url.is_empty() => Some(Arc::new(
            RedisClient::new(url).expect("Failed to create Redis client"),
        )),
        _ => None,
    };

    let gateways = Arc::new(GatewayRegistry::with_simulators(Duration::from_millis(
        config.gateway.latency_ms,
    )));

    let app_state = AppState::new(
        users,
        properties,
        bookings,
        payments,
        gateways,
        Duration::from_millis(config.gateway.timeout_ms),
        redis,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
