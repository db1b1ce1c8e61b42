//! HTTP client for the API. Authenticated calls take an explicit `Session`
//! and refuse to run once it has expired.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;

use crate::{
    auth::{
        dto::{LoginResponse, MessageResponse, RegisterResponse},
        Claims,
    },
    users::{dto::UserListResponse, model::PublicUser},
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session expired, log in again")]
    SessionExpired,
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed session token: {0}")]
    MalformedToken(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Signed-in state returned by `ApiClient::login`.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    pub user: PublicUser,
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// Reads the expiry from the token payload. The signature is the
    /// server's business and is not checked here.
    pub fn new(token: String, user: PublicUser) -> Result<Self, ClientError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        let claims = decode::<Claims>(&token, &DecodingKey::from_secret(&[]), &validation)?.claims;
        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
            .map_err(|_| ClientError::SessionExpired)?;
        Ok(Self {
            token,
            user,
            expires_at,
        })
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    fn bearer(&self) -> Result<&str, ClientError> {
        if self.is_expired() {
            return Err(ClientError::SessionExpired);
        }
        Ok(&self.token)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<PublicUser, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/register"))
            .json(&json!({ "email": email, "password": password, "name": name }))
            .send()
            .await?;
        Ok(read_json::<RegisterResponse>(resp).await?.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: LoginResponse = read_json(resp).await?;
        Session::new(body.token, body.user)
    }

    pub async fn profile(&self, session: &Session) -> Result<PublicUser, ClientError> {
        let token = session.bearer()?;
        let resp = self
            .http
            .get(self.url("/auth/profile"))
            .bearer_auth(token)
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn change_password(
        &self,
        session: &Session,
        current_password: &str,
        new_password: &str,
    ) -> Result<String, ClientError> {
        let token = session.bearer()?;
        let resp = self
            .http
            .post(self.url("/auth/change-password"))
            .bearer_auth(token)
            .json(&json!({ "currentPassword": current_password, "newPassword": new_password }))
            .send()
            .await?;
        Ok(read_json::<MessageResponse>(resp).await?.message)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/forgot-password"))
            .json(&json!({ "email": email }))
            .send()
            .await?;
        Ok(read_json::<MessageResponse>(resp).await?.message)
    }

    pub async fn list_users(
        &self,
        session: &Session,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<UserListResponse, ClientError> {
        let token = session.bearer()?;
        let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        if let Some(search) = search {
            query.push(("search", search.to_string()));
        }
        let resp = self
            .http
            .get(self.url("/users"))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;
        read_json(resp).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }
    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    let message = body
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("request failed")
        .to_string();
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::jwt::JwtKeys, config::JwtConfig, users::model::Role};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn user() -> PublicUser {
        PublicUser {
            id: Uuid::new_v4(),
            email: "alice@example.com".into(),
            name: "Alice".into(),
            role: Role::User,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn expired_token() -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let claims = Claims {
            user_id: Uuid::new_v4(),
            email: "alice@example.com".into(),
            role: Role::User,
            iat: now - 3600,
            exp: now - 60,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"server-secret"),
        )
        .unwrap()
    }

    #[test]
    fn session_reads_expiry_from_token() {
        let keys = JwtKeys::new(&JwtConfig {
            secret: "server-secret".into(),
            ttl_minutes: 60,
        });
        let u = user();
        let token = keys.issue(u.id, &u.email, u.role).unwrap();
        let session = Session::new(token, u).unwrap();

        assert!(!session.is_expired());
        let remaining = session.expires_at - OffsetDateTime::now_utc();
        assert!(remaining.whole_minutes() >= 58 && remaining.whole_minutes() <= 60);
        assert!(session.is_expired_at(session.expires_at));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(matches!(
            Session::new("nope".into(), user()),
            Err(ClientError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn expired_session_fails_before_any_request() {
        let session = Session::new(expired_token(), user()).unwrap();
        assert!(session.is_expired());

        // nothing listens here; an attempted request would be an Http error
        let client = ApiClient::new("http://127.0.0.1:9");
        assert!(matches!(
            client.profile(&session).await,
            Err(ClientError::SessionExpired)
        ));
        assert!(matches!(
            client.list_users(&session, 1, 10, None).await,
            Err(ClientError::SessionExpired)
        ));
    }
}
