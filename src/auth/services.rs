use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password, hash_password_blocking, verify_password_blocking},
        reset::{hash_reset_token, issue_reset_token},
        validation::{check_password_policy, require_email},
    },
    error::AppError,
    state::AppState,
    store::{NewUser, StoreError, UserStore},
    users::model::{Role, User},
};

lazy_static! {
    // Verified against when the email is unknown so both login failures cost the same.
    static ref DUMMY_HASH: Option<String> = hash_password("timing-equalizer-0").ok();
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

/// A reset that was recorded for an existing account.
#[derive(Debug)]
pub struct ResetRequest {
    pub email: String,
    pub raw_token: String,
}

/// Credential lifecycle: registration, login, activation and password changes.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
    reset_ttl: TimeDuration,
    require_activation: bool,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            JwtKeys::from_ref(state),
            TimeDuration::minutes(state.config.reset_ttl_minutes),
            state.config.require_activation,
        )
    }
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        keys: JwtKeys,
        reset_ttl: TimeDuration,
        require_activation: bool,
    ) -> Self {
        Self {
            store,
            keys,
            reset_ttl,
            require_activation,
        }
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<User, AppError> {
        if email.trim().is_empty() || password.is_empty() || name.trim().is_empty() {
            return Err(AppError::validation(
                "Email, password, and name are required",
            ));
        }
        let email = require_email(Some(email), "Email is required")?;
        check_password_policy(password, "Password")?;

        if self.store.find_by_email(&email).await?.is_some() {
            warn!(%email, "email already registered");
            return Err(AppError::Conflict("User already exists"));
        }

        let password_hash = hash_password_blocking(password.to_string()).await?;
        let user = self
            .store
            .create(NewUser {
                email,
                password_hash,
                name: name.trim().to_string(),
                role: Role::User,
                is_active: !self.require_activation,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate => AppError::Conflict("User already exists"),
                other => AppError::Storage(other),
            })?;

        info!(user_id = %user.id, email = %user.email, active = user.is_active, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation("Email and password are required"));
        }
        let email = require_email(Some(email), "Email is required")?;

        let Some(user) = self.store.find_by_email(&email).await? else {
            if let Some(dummy) = DUMMY_HASH.as_ref() {
                let _ = verify_password_blocking(password.to_string(), dummy.clone()).await;
            }
            warn!(%email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let ok = verify_password_blocking(password.to_string(), user.password_hash.clone())
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user.id, "stored password hash unreadable");
                AppError::Internal(e)
            })?;
        if !ok {
            warn!(%email, user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(user_id = %user.id, "login on inactive account");
            return Err(AppError::AccountInactive);
        }

        let token = self.keys.issue(user.id, &user.email, user.role)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(LoginOutcome { token, user })
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User not found"))
    }

    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AppError::validation(
                "Current password and new password are required",
            ));
        }
        check_password_policy(new_password, "New password")?;

        let user = self.get_profile(user_id).await?;
        let ok = verify_password_blocking(current_password.to_string(), user.password_hash)
            .await?;
        if !ok {
            warn!(%user_id, "change password with wrong current password");
            return Err(AppError::InvalidCredentials);
        }

        let password_hash = hash_password_blocking(new_password.to_string()).await?;
        if !self.store.set_password_hash(user_id, &password_hash).await? {
            return Err(AppError::NotFound("User not found"));
        }
        info!(%user_id, "password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn activate(&self, user_id: Uuid) -> Result<User, AppError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("Invalid activation link"))?;
        if user.is_active {
            return Err(AppError::AlreadyActive);
        }
        let user = self
            .store
            .set_active(user_id, true)
            .await?
            .ok_or(AppError::NotFound("Invalid activation link"))?;
        info!(%user_id, "account activated");
        Ok(user)
    }

    /// Records a pending reset when the account exists. The raw token is
    /// only ever returned here, for delivery to the account owner.
    #[instrument(skip(self))]
    pub async fn request_password_reset(
        &self,
        email: Option<&str>,
    ) -> Result<Option<ResetRequest>, AppError> {
        let email = require_email(email, "Valid email is required")?;

        let Some(user) = self.store.find_by_email(&email).await? else {
            info!(%email, "password reset requested for unknown email");
            return Ok(None);
        };

        let issued = issue_reset_token(OffsetDateTime::now_utc(), self.reset_ttl);
        self.store.set_pending_reset(user.id, &issued.pending).await?;
        info!(user_id = %user.id, expires_at = %issued.pending.expires_at, "password reset issued");

        Ok(Some(ResetRequest {
            email: user.email,
            raw_token: issued.raw_token,
        }))
    }

    #[instrument(skip_all)]
    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> Result<(), AppError> {
        if new_password.is_empty() {
            return Err(AppError::validation("New password is required"));
        }
        check_password_policy(new_password, "New password")?;
        if raw_token.is_empty() {
            return Err(AppError::InvalidOrExpiredToken);
        }

        let password_hash = hash_password_blocking(new_password.to_string()).await?;
        let consumed = self
            .store
            .consume_reset(
                &hash_reset_token(raw_token),
                OffsetDateTime::now_utc(),
                &password_hash,
            )
            .await?;

        match consumed {
            Some(user_id) => {
                info!(%user_id, "password reset completed");
                Ok(())
            }
            None => {
                warn!("reset attempted with unknown or expired token");
                Err(AppError::InvalidOrExpiredToken)
            }
        }
    }
}
