use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewUser, StoreError, UserPage, UserQuery, UserStore};
use crate::users::model::{PendingReset, Role, User};

/// Process-local store. Every mutation runs under the write lock, so
/// updates to a single record never interleave.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(user: &User, needle: &str) -> bool {
    user.name.to_lowercase().contains(needle) || user.email.to_lowercase().contains(needle)
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            name: new_user.name,
            role: new_user.role,
            is_active: new_user.is_active,
            created_at: OffsetDateTime::now_utc(),
            pending_reset: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list(&self, query: &UserQuery) -> Result<UserPage, StoreError> {
        let users = self.users.read().await;
        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut matched: Vec<&User> = users
            .values()
            .filter(|u| needle.as_deref().map_or(true, |n| matches_search(u, n)))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(UserPage { users: page, total })
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        Ok(match users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.pending_reset = None;
                true
            }
            None => false,
        })
    }

    async fn set_pending_reset(&self, id: Uuid, reset: &PendingReset) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        Ok(match users.get_mut(&id) {
            Some(user) => {
                user.pending_reset = Some(reset.clone());
                true
            }
            None => false,
        })
    }

    async fn consume_reset(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut users = self.users.write().await;
        let found = users.values_mut().find(|u| {
            u.pending_reset
                .as_ref()
                .is_some_and(|r| r.token_hash == token_hash && r.expires_at > now)
        });
        Ok(found.map(|user| {
            user.password_hash = new_password_hash.to_string();
            user.pending_reset = None;
            user.id
        }))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.is_active = active;
            user.clone()
        }))
    }

    async fn toggle_active(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.is_active = !user.is_active;
            user.clone()
        }))
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}
