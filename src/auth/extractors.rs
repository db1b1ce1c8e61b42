use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{auth::jwt::JwtKeys, error::AppError, users::model::Role};

/// Identity decoded from a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admin-only actions against another account. Acting on oneself is
    /// refused even for admins.
    pub fn ensure_can_administer(&self, target: Uuid) -> Result<(), AppError> {
        if !self.is_admin() || self.user_id == target {
            info!(actor = %self.user_id, %target, role = %self.role, "admin action refused");
            return Err(AppError::Forbidden);
        }
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized("Missing Authorization header"))?;

        // Expect "Bearer <token>"
        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized("Invalid Authorization header"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            AppError::Unauthorized("Invalid or expired token")
        })?;

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        })
    }
}
