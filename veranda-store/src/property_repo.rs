use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use veranda_catalog::property::{
    NewProperty, Property, PropertyFilter, PropertyRepository, PropertyStats, PropertyStatus,
    PropertyUpdate,
};
use veranda_core::repository::Page;
use veranda_core::{CoreError, CoreResult};

pub struct PgPropertyRepository {
    pool: PgPool,
}

impl PgPropertyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PROPERTY_COLUMNS: &str = "id, merchant_id, name, description, location, address, \
     price_per_night, currency, bedrooms, bathrooms, max_guests, amenities, images, \
     rating, review_count, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: Uuid,
    merchant_id: Uuid,
    name: String,
    description: Option<String>,
    location: String,
    address: Option<String>,
    price_per_night: Decimal,
    currency: String,
    bedrooms: i32,
    bathrooms: i32,
    max_guests: i32,
    amenities: Vec<String>,
    images: Vec<String>,
    rating: f64,
    review_count: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PropertyRow {
    fn into_property(self) -> CoreResult<Property> {
        let status = match self.status.as_str() {
            "pending" => PropertyStatus::Pending,
            "active" => PropertyStatus::Active,
            "rejected" => PropertyStatus::Rejected,
            other => {
                return Err(CoreError::InternalError(format!(
                    "Unknown property status in store: {other}"
                )))
            }
        };

        Ok(Property {
            id: self.id,
            merchant_id: self.merchant_id,
            name: self.name,
            description: self.description,
            location: self.location,
            address: self.address,
            price_per_night: self.price_per_night,
            currency: self.currency,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            max_guests: self.max_guests,
            amenities: self.amenities,
            images: self.images,
            rating: self.rating,
            review_count: self.review_count,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn internal(e: sqlx::Error) -> CoreError {
    CoreError::InternalError(e.to_string())
}

#[async_trait]
impl PropertyRepository for PgPropertyRepository {
    async fn create(&self, property: NewProperty) -> CoreResult<Property> {
        let sql = format!(
            "INSERT INTO properties \
                (id, merchant_id, name, description, location, address, price_per_night, \
                 currency, bedrooms, bathrooms, max_guests, amenities, images, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'pending') \
             RETURNING {PROPERTY_COLUMNS}"
        );

        let row = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(property.merchant_id)
            .bind(&property.name)
            .bind(&property.description)
            .bind(&property.location)
            .bind(&property.address)
            .bind(property.price_per_night)
            .bind(&property.currency)
            .bind(property.bedrooms)
            .bind(property.bathrooms)
            .bind(property.max_guests)
            .bind(&property.amenities)
            .bind(&property.images)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;

        row.into_property()
    }

    async fn find(&self, id: Uuid) -> CoreResult<Option<Property>> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1");
        let row = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;

        row.map(PropertyRow::into_property).transpose()
    }

    async fn list(&self, filter: PropertyFilter, page: Page) -> CoreResult<Vec<Property>> {
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::uuid IS NULL OR merchant_id = $2) \
               AND ($3::text IS NULL OR location ILIKE '%' || $3 || '%') \
               AND ($4::numeric IS NULL OR price_per_night >= $4) \
               AND ($5::numeric IS NULL OR price_per_night <= $5) \
               AND ($6::int IS NULL OR max_guests >= $6) \
               AND ($7::text IS NULL OR name ILIKE '%' || $7 || '%' \
                    OR description ILIKE '%' || $7 || '%') \
             ORDER BY created_at DESC LIMIT $8 OFFSET $9"
        );

        let rows = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.merchant_id)
            .bind(&filter.location)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.guests)
            .bind(&filter.search)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        rows.into_iter().map(PropertyRow::into_property).collect()
    }

    async fn featured(&self, limit: i64) -> CoreResult<Vec<Property>> {
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE status = 'active' \
             ORDER BY rating DESC, review_count DESC LIMIT $1"
        );

        let rows = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        rows.into_iter().map(PropertyRow::into_property).collect()
    }

    async fn update(&self, id: Uuid, update: PropertyUpdate) -> CoreResult<Property> {
        let sql = format!(
            "UPDATE properties SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                location = COALESCE($4, location), \
                address = COALESCE($5, address), \
                price_per_night = COALESCE($6, price_per_night), \
                bedrooms = COALESCE($7, bedrooms), \
                bathrooms = COALESCE($8, bathrooms), \
                max_guests = COALESCE($9, max_guests), \
                amenities = COALESCE($10, amenities), \
                images = COALESCE($11, images), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {PROPERTY_COLUMNS}"
        );

        let row = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(&update.description)
            .bind(&update.location)
            .bind(&update.address)
            .bind(update.price_per_night)
            .bind(update.bedrooms)
            .bind(update.bathrooms)
            .bind(update.max_guests)
            .bind(&update.amenities)
            .bind(&update.images)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| CoreError::NotFound("Property not found.".to_string()))?;

        row.into_property()
    }

    async fn delete(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound("Property not found.".to_string()));
        }
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: PropertyStatus) -> CoreResult<Property> {
        let sql = format!(
            "UPDATE properties SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {PROPERTY_COLUMNS}"
        );

        let row = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| CoreError::NotFound("Property not found.".to_string()))?;

        row.into_property()
    }

    async fn stats(&self, merchant_id: Option<Uuid>) -> CoreResult<PropertyStats> {
        #[derive(sqlx::FromRow)]
        struct StatsRow {
            total: i64,
            active: i64,
            pending: i64,
        }

        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE status = 'active') AS active, \
                    COUNT(*) FILTER (WHERE status = 'pending') AS pending \
             FROM properties WHERE ($1::uuid IS NULL OR merchant_id = $1)",
        )
        .bind(merchant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;

        Ok(PropertyStats {
            total: row.total,
            active: row.active,
            pending: row.pending,
        })
    }
}
