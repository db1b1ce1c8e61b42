use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    state::AppState,
    store::{UserQuery, UserStore},
    users::{
        dto::UserListResponse,
        model::{Role, User},
    },
};

/// Read access for any signed-in caller, mutations for admins.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
}

impl FromRef<AppState> for UserDirectory {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.store.clone())
    }
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn list(
        &self,
        page: i64,
        limit: i64,
        search: Option<&str>,
    ) -> Result<UserListResponse, AppError> {
        let result = self
            .store
            .list(&UserQuery {
                search: search.map(String::from),
                offset: (page - 1).saturating_mul(limit),
                limit,
            })
            .await?;

        Ok(UserListResponse {
            users: result.users.into_iter().map(Into::into).collect(),
            current_page: page,
            total_pages: (result.total + limit - 1) / limit,
            total_users: result.total,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<User, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("User not found"))
    }

    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn toggle_status(&self, actor: &AuthUser, id: Uuid) -> Result<User, AppError> {
        actor.ensure_can_administer(id)?;
        let user = self
            .store
            .toggle_active(id)
            .await?
            .ok_or(AppError::NotFound("User not found"))?;
        info!(target_user = %id, active = user.is_active, "user status toggled");
        Ok(user)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn set_role(
        &self,
        actor: &AuthUser,
        id: Uuid,
        role: Option<&str>,
    ) -> Result<User, AppError> {
        actor.ensure_can_administer(id)?;
        let role: Role = role
            .and_then(|r| r.parse().ok())
            .ok_or_else(|| AppError::validation("Invalid role specified"))?;
        let user = self
            .store
            .set_role(id, role)
            .await?
            .ok_or(AppError::NotFound("User not found"))?;
        info!(target_user = %id, %role, "user role updated");
        Ok(user)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> Result<(), AppError> {
        actor.ensure_can_administer(id)?;
        if !self.store.delete(id).await? {
            return Err(AppError::NotFound("User not found"));
        }
        info!(target_user = %id, "user deleted");
        Ok(())
    }
}
