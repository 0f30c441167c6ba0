use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use veranda_core::repository::Page;
use veranda_core::CoreResult;

/// Listing lifecycle. Merchants create listings in `Pending`; an admin
/// approves them to `Active` (visible and bookable) or rejects them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Pending,
    Active,
    Rejected,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Pending => "pending",
            PropertyStatus::Active => "active",
            PropertyStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rentable property listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: String,
    pub address: Option<String>,
    /// Nightly rate. Zero is a valid rate (demo/free listing).
    pub price_per_night: Decimal,
    pub currency: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub max_guests: i32,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub rating: f64,
    pub review_count: i32,
    pub status: PropertyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub merchant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: String,
    pub address: Option<String>,
    pub price_per_night: Decimal,
    pub currency: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub max_guests: i32,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub price_per_night: Option<Decimal>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub max_guests: Option<i32>,
    pub amenities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct PropertyFilter {
    pub status: Option<PropertyStatus>,
    pub merchant_id: Option<Uuid>,
    pub location: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub guests: Option<i32>,
    /// Free-text match against name and description.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyStats {
    pub total: i64,
    pub active: i64,
    pub pending: i64,
}

/// Repository trait for property data access
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn create(&self, property: NewProperty) -> CoreResult<Property>;

    async fn find(&self, id: Uuid) -> CoreResult<Option<Property>>;

    async fn list(&self, filter: PropertyFilter, page: Page) -> CoreResult<Vec<Property>>;

    /// Highest-rated active listings, for the landing page.
    async fn featured(&self, limit: i64) -> CoreResult<Vec<Property>>;

    async fn update(&self, id: Uuid, update: PropertyUpdate) -> CoreResult<Property>;

    async fn delete(&self, id: Uuid) -> CoreResult<()>;

    async fn set_status(&self, id: Uuid, status: PropertyStatus) -> CoreResult<Property>;

    async fn stats(&self, merchant_id: Option<Uuid>) -> CoreResult<PropertyStats>;
}
