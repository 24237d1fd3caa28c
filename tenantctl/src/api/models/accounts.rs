//! API request/response models for tenant accounts.

use super::pagination::Pagination;
use crate::db::models::accounts::AccountDBResponse;
use crate::types::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Lifecycle state of a tenant account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    /// Terminal state; closed accounts are soft-deleted and never come back
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive a URL-safe slug from an account name.
///
/// Lowercases ASCII alphanumerics and collapses everything else into single
/// dashes: "Acme Inc." becomes "acme-inc". Names with no slug-worthy
/// characters fall back to "account", so the result is never empty.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut prev_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("account");
    }
    slug
}

// Account request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountCreate {
    pub name: String,
    /// Generated from the name when omitted
    pub slug: Option<String>,
    /// Defaults to "free"
    pub plan: Option<String>,
    pub contact_email: Option<String>,
    #[schema(value_type = Object)]
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub plan: Option<String>,
    pub contact_email: Option<String>,
    #[schema(value_type = Object)]
    pub settings: Option<serde_json::Value>,
}

// Account response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AccountId,
    pub name: String,
    pub slug: String,
    pub status: AccountStatus,
    pub plan: String,
    pub contact_email: Option<String>,
    #[schema(value_type = Object)]
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended_at: Option<DateTime<Utc>>,
}

impl From<AccountDBResponse> for AccountResponse {
    fn from(db: AccountDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            slug: db.slug,
            status: db.status,
            plan: db.plan,
            contact_email: db.contact_email,
            settings: db.settings,
            created_at: db.created_at,
            updated_at: db.updated_at,
            suspended_at: db.suspended_at,
        }
    }
}

/// Query parameters for listing accounts
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListAccountsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Filter by lifecycle state
    pub status: Option<AccountStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Inc"), "acme-inc");
        assert_eq!(slugify("Acme, Inc."), "acme-inc");
        assert_eq!(slugify("  spaced  out  "), "spaced-out");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("Ünïcödé"), "n-c-d");
    }

    // Punctuation-only and non-ASCII-only names must still produce a slug
    // the create endpoint's validation would accept
    #[test]
    fn test_slugify_never_returns_empty() {
        assert_eq!(slugify("!!!"), "account");
        assert_eq!(slugify(""), "account");
        assert_eq!(slugify("日本語"), "account");
        assert_eq!(slugify("---"), "account");
    }
}
