use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{NewUser, StoreError, UserPage, UserQuery, UserStore};
use crate::users::model::{PendingReset, Role, User};

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    name: String,
    role: Role,
    is_active: bool,
    created_at: OffsetDateTime,
    password_reset_token_hash: Option<String>,
    password_reset_expires_at: Option<OffsetDateTime>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        // the table CHECK keeps these paired
        let pending_reset = match (r.password_reset_token_hash, r.password_reset_expires_at) {
            (Some(token_hash), Some(expires_at)) => Some(PendingReset {
                token_hash,
                expires_at,
            }),
            _ => None,
        };
        Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            name: r.name,
            role: r.role,
            is_active: r.is_active,
            created_at: r.created_at,
            pending_reset,
        }
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(map_sqlx_error),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Duplicate;
        }
    }
    StoreError::Backend(e)
}

fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT id, email, password_hash, name, role, is_active, created_at,
                           password_reset_token_hash, password_reset_expires_at
                    FROM users
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .fetch_optional(&self.db),
            )
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT id, email, password_hash, name, role, is_active, created_at,
                           password_reset_token_hash, password_reset_expires_at
                    FROM users
                    WHERE lower(email) = lower($1)
                    "#,
                )
                .bind(email)
                .fetch_optional(&self.db),
            )
            .await?;
        Ok(row.map(User::from))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    INSERT INTO users (email, password_hash, name, role, is_active)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, email, password_hash, name, role, is_active, created_at,
                              password_reset_token_hash, password_reset_expires_at
                    "#,
                )
                .bind(&new_user.email)
                .bind(&new_user.password_hash)
                .bind(&new_user.name)
                .bind(new_user.role)
                .bind(new_user.is_active)
                .fetch_one(&self.db),
            )
            .await?;
        Ok(row.into())
    }

    async fn list(&self, query: &UserQuery) -> Result<UserPage, StoreError> {
        let pattern = query.search.as_deref().map(like_pattern);

        let rows = self
            .timed(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT id, email, password_hash, name, role, is_active, created_at,
                           password_reset_token_hash, password_reset_expires_at
                    FROM users
                    WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)
                    ORDER BY created_at DESC, id
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(pattern.as_deref())
                .bind(query.limit)
                .bind(query.offset)
                .fetch_all(&self.db),
            )
            .await?;

        let total = self
            .timed(
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*)
                    FROM users
                    WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)
                    "#,
                )
                .bind(pattern.as_deref())
                .fetch_one(&self.db),
            )
            .await?;

        Ok(UserPage {
            users: rows.into_iter().map(User::from).collect(),
            total,
        })
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let res = self
            .timed(
                sqlx::query(
                    r#"
                    UPDATE users
                    SET password_hash = $2,
                        password_reset_token_hash = NULL,
                        password_reset_expires_at = NULL
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(password_hash)
                .execute(&self.db),
            )
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_pending_reset(&self, id: Uuid, reset: &PendingReset) -> Result<bool, StoreError> {
        let res = self
            .timed(
                sqlx::query(
                    r#"
                    UPDATE users
                    SET password_reset_token_hash = $2,
                        password_reset_expires_at = $3
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&reset.token_hash)
                .bind(reset.expires_at)
                .execute(&self.db),
            )
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn consume_reset(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        self.timed(
            sqlx::query_scalar::<_, Uuid>(
                r#"
                UPDATE users
                SET password_hash = $3,
                    password_reset_token_hash = NULL,
                    password_reset_expires_at = NULL
                WHERE password_reset_token_hash = $1
                  AND password_reset_expires_at > $2
                RETURNING id
                "#,
            )
            .bind(token_hash)
            .bind(now)
            .bind(new_password_hash)
            .fetch_optional(&self.db),
        )
        .await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError> {
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    UPDATE users SET is_active = $2
                    WHERE id = $1
                    RETURNING id, email, password_hash, name, role, is_active, created_at,
                              password_reset_token_hash, password_reset_expires_at
                    "#,
                )
                .bind(id)
                .bind(active)
                .fetch_optional(&self.db),
            )
            .await?;
        Ok(row.map(User::from))
    }

    async fn toggle_active(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    UPDATE users SET is_active = NOT is_active
                    WHERE id = $1
                    RETURNING id, email, password_hash, name, role, is_active, created_at,
                              password_reset_token_hash, password_reset_expires_at
                    "#,
                )
                .bind(id)
                .fetch_optional(&self.db),
            )
            .await?;
        Ok(row.map(User::from))
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError> {
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    UPDATE users SET role = $2
                    WHERE id = $1
                    RETURNING id, email, password_hash, name, role, is_active, created_at,
                              password_reset_token_hash, password_reset_expires_at
                    "#,
                )
                .bind(id)
                .bind(role)
                .fetch_optional(&self.db),
            )
            .await?;
        Ok(row.map(User::from))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = self
            .timed(
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id)
                    .execute(&self.db),
            )
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("bob"), "%bob%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn row_with_half_reset_state_has_no_pending_reset() {
        let row = UserRow {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            password_hash: "h".into(),
            name: "A".into(),
            role: Role::User,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
            password_reset_token_hash: Some("t".into()),
            password_reset_expires_at: None,
        };
        assert!(User::from(row).pending_reset.is_none());
    }
}
