//! Database models for API keys.

use crate::api::models::api_keys::{ApiKeyCreate, ApiKeyStatus};
use crate::types::{ApiKeyId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new API key. The secret is generated in the
/// repository, never supplied by callers.
#[derive(Debug, Clone)]
pub struct ApiKeyCreateDBRequest {
    pub user_id: UserId,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyCreateDBRequest {
    pub fn from_api(user_id: UserId, api: ApiKeyCreate) -> Self {
        Self {
            user_id,
            name: api.name,
            expires_at: api.expires_at,
        }
    }
}

/// Database request for renaming an API key. Nothing else can change after
/// creation; status moves only through revocation.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyUpdateDBRequest {
    pub name: Option<String>,
}

/// Database response for an API key
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyDBResponse {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    pub secret: String,
    pub status: ApiKeyStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKeyDBResponse {
    /// Whether the key currently authenticates requests.
    pub fn is_usable(&self) -> bool {
        self.status == ApiKeyStatus::Active && self.expires_at.is_none_or(|t| t > Utc::now())
    }
}
