//! Database models for tenant accounts.

use crate::api::models::accounts::{AccountCreate, AccountStatus, AccountUpdate, slugify};
use crate::types::AccountId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new account
#[derive(Debug, Clone)]
pub struct AccountCreateDBRequest {
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub contact_email: Option<String>,
    pub settings: serde_json::Value,
}

impl From<AccountCreate> for AccountCreateDBRequest {
    fn from(api: AccountCreate) -> Self {
        let slug = api.slug.unwrap_or_else(|| slugify(&api.name));
        Self {
            name: api.name,
            slug,
            plan: api.plan.unwrap_or_else(|| "free".to_string()),
            contact_email: api.contact_email,
            settings: api.settings.unwrap_or_else(|| serde_json::json!({})),
        }
    }
}

/// Database request for updating an account
#[derive(Debug, Clone, Default)]
pub struct AccountUpdateDBRequest {
    pub name: Option<String>,
    pub plan: Option<String>,
    pub contact_email: Option<String>,
    pub settings: Option<serde_json::Value>,
}

impl From<AccountUpdate> for AccountUpdateDBRequest {
    fn from(api: AccountUpdate) -> Self {
        Self {
            name: api.name,
            plan: api.plan,
            contact_email: api.contact_email,
            settings: api.settings,
        }
    }
}

/// Database response for an account
#[derive(Debug, Clone, FromRow)]
pub struct AccountDBResponse {
    pub id: AccountId,
    pub name: String,
    pub slug: String,
    pub status: AccountStatus,
    pub plan: String,
    pub contact_email: Option<String>,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}
