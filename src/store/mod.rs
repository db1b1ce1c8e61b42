//! Credential store: persistence of user records behind the `UserStore` seam.

mod memory;
mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::model::{PendingReset, Role, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate record")]
    Duplicate,
    #[error("store call timed out")]
    Timeout,
    #[error("store backend: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Fields required to insert a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Case-insensitive substring matched against name or email.
    pub search: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// `email` must already be normalized to lowercase.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::Duplicate` when the email is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Newest first.
    async fn list(&self, query: &UserQuery) -> Result<UserPage, StoreError>;

    /// Replaces the password hash and drops any pending reset.
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError>;

    /// Writes hash and expiry together, replacing any earlier pending reset.
    async fn set_pending_reset(&self, id: Uuid, reset: &PendingReset) -> Result<bool, StoreError>;

    /// Atomically matches an unexpired reset by token hash, stores the new
    /// password hash and clears the reset. Returns the affected user id.
    async fn consume_reset(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> Result<Option<Uuid>, StoreError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError>;

    async fn toggle_active(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}
