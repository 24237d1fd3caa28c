//! API request/response models for users.

use super::pagination::Pagination;
use crate::api::models::roles::RoleRef;
use crate::db::models::users::UserDBResponse;
use crate::types::{AccountId, Permission, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Lifecycle state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    /// Created without credentials; becomes active once a password is set
    Invited,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Invited => "invited",
            Self::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// User request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Optional initial password. Users created without one start as invited.
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub password: Option<String>,
    pub status: Option<UserStatus>,
}

// User response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub status: UserStatus,
    pub is_admin: bool,
    pub roles: Vec<RoleRef>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            account_id: db.account_id,
            username: db.username,
            email: db.email,
            display_name: db.display_name,
            status: db.status,
            is_admin: db.is_admin,
            roles: db.roles,
            last_login: db.last_login,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Filter by lifecycle state
    pub status: Option<UserStatus>,
}

/// The authenticated principal attached to a request.
///
/// Built by the auth extractor from a session cookie or API key, with
/// permissions aggregated from the user's roles at request time. Never
/// serialized; responses project [`UserResponse`] instead.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub display_name: Option<String>,
    pub permissions: Vec<Permission>,
}
