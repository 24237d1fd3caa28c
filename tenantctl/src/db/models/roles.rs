//! Database models for roles and role assignments.

use crate::api::models::roles::{RoleCreate, RoleUpdate};
use crate::types::{AccountId, RoleId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new role
#[derive(Debug, Clone)]
pub struct RoleCreateDBRequest {
    /// Account the role belongs to. None for platform-wide roles, which only
    /// the bootstrap seeding creates.
    pub account_id: Option<AccountId>,
    pub name: String,
    pub description: Option<String>,
    /// Validated `{resource}:{access}` strings
    pub permissions: Vec<String>,
    pub is_system: bool,
}

impl RoleCreateDBRequest {
    pub fn from_api(account_id: AccountId, api: RoleCreate) -> Self {
        Self {
            account_id: Some(account_id),
            name: api.name,
            description: api.description,
            permissions: api.permissions,
            is_system: false, // system roles come from seeding only
        }
    }
}

/// Database request for updating a role
#[derive(Debug, Clone, Default)]
pub struct RoleUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

impl From<RoleUpdate> for RoleUpdateDBRequest {
    fn from(api: RoleUpdate) -> Self {
        Self {
            name: api.name,
            description: api.description,
            permissions: api.permissions,
        }
    }
}

/// Database response for a role
#[derive(Debug, Clone, FromRow)]
pub struct RoleDBResponse {
    pub id: RoleId,
    pub account_id: Option<AccountId>,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
