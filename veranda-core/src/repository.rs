use async_trait::async_trait;
use uuid::Uuid;

use crate::identity::{NewUser, ProfileUpdate, Role, User};
use crate::CoreResult;

/// Limit/offset pagination shared by every listing operation.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(20).clamp(1, 100),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Repository trait for user data access
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> CoreResult<User>;

    async fn find(&self, id: Uuid) -> CoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>>;

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> CoreResult<User>;

    async fn list(&self, role: Option<Role>, page: Page) -> CoreResult<Vec<User>>;
}
