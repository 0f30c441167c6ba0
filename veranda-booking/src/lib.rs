pub mod gateway;
pub mod manager;
pub mod models;
pub mod payments;
pub mod repository;

pub use gateway::GatewayRegistry;
pub use manager::BookingManager;
pub use models::{Booking, BookingPaymentStatus, BookingStatus, Payment, PaymentMethod, PaymentStatus};
pub use payments::PaymentProcessor;
pub use repository::{BookingRepository, PaymentRepository};
