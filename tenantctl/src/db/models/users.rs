//! Database models for users.

use crate::api::models::roles::RoleRef;
use crate::api::models::users::{UserCreate, UserStatus, UserUpdate};
use crate::types::{AccountId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub status: UserStatus,
    pub is_admin: bool,
    pub password_hash: Option<String>,
}

impl UserCreateDBRequest {
    /// Build a create request from the API payload. Users without a password
    /// start in the invited state; the password hash is supplied separately
    /// because hashing happens at the API layer.
    pub fn from_api(account_id: AccountId, api: UserCreate, password_hash: Option<String>) -> Self {
        let status = if password_hash.is_some() { UserStatus::Active } else { UserStatus::Invited };
        Self {
            account_id,
            username: api.username,
            email: api.email,
            display_name: api.display_name,
            status,
            is_admin: false, // API users cannot create platform admins
            password_hash,
        }
    }
}

/// Database request for updating a user
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub status: Option<UserStatus>,
    pub password_hash: Option<String>,
}

impl UserUpdateDBRequest {
    pub fn new(update: UserUpdate) -> Self {
        Self {
            display_name: update.display_name,
            status: update.status,
            password_hash: None, // Password changes hash at the API layer
        }
    }
}

/// Database response for a user
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
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
    pub deleted_at: Option<DateTime<Utc>>,
    pub password_hash: Option<String>,
}
