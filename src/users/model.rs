use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Account role. Stored as the Postgres enum `user_role`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// A password reset awaiting use. Only the SHA-256 of the raw token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReset {
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

/// User record as held by the credential store.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub pending_reset: Option<PendingReset>,
}

/// Public projection of a user. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            name: u.name.clone(),
            role: u.role,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_only_known_values() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("Admin".parse::<Role>().is_err());
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn public_user_has_no_credential_fields() {
        let user = User {
            id: Uuid::new_v4(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            name: "Alice".into(),
            role: Role::User,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
            pending_reset: Some(PendingReset {
                token_hash: "abc".into(),
                expires_at: OffsetDateTime::now_utc(),
            }),
        };
        let json = serde_json::to_value(PublicUser::from(&user)).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj["role"], "user");
        assert_eq!(obj["isActive"], true);
        assert!(obj.contains_key("createdAt"));
        assert!(obj.keys().all(|k| !k.to_lowercase().contains("password")));
        assert!(obj.keys().all(|k| !k.to_lowercase().contains("reset")));
    }
}
