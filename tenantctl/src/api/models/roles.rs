//! API request/response models for roles.

use super::pagination::Pagination;
use crate::db::models::roles::RoleDBResponse;
use crate::types::{AccountId, RoleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// Role request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleCreate {
    pub name: String,
    pub description: Option<String>,
    /// Permission strings of the form "resource:access", e.g. "users:write"
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

// Role response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    /// Absent for platform-wide roles
    #[schema(value_type = Option<String>, format = "uuid")]
    pub account_id: Option<AccountId>,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoleDBResponse> for RoleResponse {
    fn from(db: RoleDBResponse) -> Self {
        Self {
            id: db.id,
            account_id: db.account_id,
            name: db.name,
            description: db.description,
            permissions: db.permissions,
            is_system: db.is_system,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Compact role reference embedded in user responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RoleRef {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    pub name: String,
}

/// Query parameters for listing roles
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListRolesQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
