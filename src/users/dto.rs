use serde::{Deserialize, Serialize};

use crate::users::model::PublicUser;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Query string of `GET /users`. Values that fail to parse fall back to defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListUsersQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl ListUsersQuery {
    pub fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .map(|l| l.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn search(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<PublicUser>,
    pub current_page: i64,
    pub total_pages: i64,
    pub total_users: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateRoleRequest {
    pub role: Option<String>,
}

/// Response of the admin mutations.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserActionResponse {
    pub message: String,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, limit: Option<&str>, search: Option<&str>) -> ListUsersQuery {
        ListUsersQuery {
            page: page.map(String::from),
            limit: limit.map(String::from),
            search: search.map(String::from),
        }
    }

    #[test]
    fn defaults_apply_to_missing_or_bad_values() {
        let q = query(None, None, None);
        assert_eq!((q.page(), q.limit(), q.search()), (1, 10, None));

        let q = query(Some("abc"), Some("-3"), Some("   "));
        assert_eq!((q.page(), q.limit(), q.search()), (1, 10, None));
    }

    #[test]
    fn limit_is_capped() {
        let q = query(Some("3"), Some("500"), Some(" bob "));
        assert_eq!((q.page(), q.limit(), q.search()), (3, MAX_PAGE_SIZE, Some("bob")));
    }
}
