use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use veranda_core::identity::{NewUser, ProfileUpdate, Role, User};
use veranda_core::repository::{Page, UserRepository};
use veranda_core::{CoreError, CoreResult};

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, email, password_hash, name, role, phone, avatar, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    name: String,
    role: String,
    phone: Option<String>,
    avatar: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> CoreResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            role: self.role.parse::<Role>()?,
            phone: self.phone,
            avatar: self.avatar,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn internal(e: sqlx::Error) -> CoreError {
    CoreError::InternalError(e.to_string())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> CoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, name, role, phone) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(&user.phone)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    CoreError::Conflict("Email already registered.".to_string())
                }
                _ => internal(e),
            })?;

        row.into_user()
    }

    async fn find(&self, id: Uuid) -> CoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> CoreResult<User> {
        let sql = format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                phone = COALESCE($3, phone), \
                avatar = COALESCE($4, avatar), \
                password_hash = COALESCE($5, password_hash), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(&update.phone)
            .bind(&update.avatar)
            .bind(&update.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| CoreError::NotFound("User not found.".to_string()))?;

        row.into_user()
    }

    async fn list(&self, role: Option<Role>, page: Page) -> CoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::text IS NULL OR role = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );

        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.map(|r| r.as_str()))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        rows.into_iter().map(UserRow::into_user).collect()
    }
}
