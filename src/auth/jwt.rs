use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{auth::claims::Claims, config::JwtConfig, state::AppState, users::model::Role};

/// Bad signature, malformed payload or elapsed expiry.
#[derive(Debug, Error)]
#[error("invalid or expired token")]
pub struct InvalidToken(#[source] pub jsonwebtoken::errors::Error);

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::from_secs((config.ttl_minutes.max(0) as u64) * 60),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str, role: Role) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            user_id,
            email: email.to_string(),
            role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %user_id, role = %role, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, InvalidToken> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(InvalidToken)?;
        debug!(user_id = %data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::new(&state.config.jwt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            ttl_minutes: 60 * 24,
        })
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = make_keys("dev-secret");
        let user_id = Uuid::new_v4();
        let token = keys
            .issue(user_id, "alice@example.com", Role::Admin)
            .expect("sign");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn verify_rejects_other_secret() {
        let token = make_keys("secret-a")
            .issue(Uuid::new_v4(), "a@example.com", Role::User)
            .unwrap();
        assert!(make_keys("secret-b").verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let keys = make_keys("dev-secret");
        let token = keys
            .issue(Uuid::new_v4(), "a@example.com", Role::User)
            .unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let forged = keys
            .issue(Uuid::new_v4(), "a@example.com", Role::Admin)
            .unwrap();
        parts[1] = forged.split('.').nth(1).unwrap().to_string();
        assert!(keys.verify(&parts.join(".")).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret");
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let claims = Claims {
            user_id: Uuid::new_v4(),
            email: "a@example.com".into(),
            role: Role::User,
            iat: now - 7200,
            exp: now - 10,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(make_keys("dev-secret").verify("not.a.jwt").is_err());
    }
}
