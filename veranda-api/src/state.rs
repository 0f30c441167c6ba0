use std::sync::Arc;
use std::time::Duration;

use veranda_booking::repository::{BookingRepository, PaymentRepository};
use veranda_booking::{BookingManager, GatewayRegistry, PaymentProcessor};
use veranda_catalog::property::PropertyRepository;
use veranda_core::repository::UserRepository;
use veranda_store::RedisClient;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub properties: Arc<dyn PropertyRepository>,
    pub booking_manager: Arc<BookingManager>,
    pub payment_processor: Arc<PaymentProcessor>,
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        properties: Arc<dyn PropertyRepository>,
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateways: Arc<GatewayRegistry>,
        gateway_timeout: Duration,
        redis: Option<Arc<RedisClient>>,
        auth: AuthConfig,
    ) -> Self {
        let booking_manager = Arc::new(BookingManager::new(properties.clone(), bookings.clone()));
        let payment_processor = Arc::new(PaymentProcessor::new(
            bookings,
            payments,
            gateways,
            gateway_timeout,
        ));

        Self {
            users,
            properties,
            booking_manager,
            payment_processor,
            redis,
            auth,
        }
    }
}
