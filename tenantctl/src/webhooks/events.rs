//! Webhook event types and payload envelope.
//!
//! Every mutation that external systems may care about publishes one of these
//! events. Event names follow the `resource.action` convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::AccountId;

/// Event types published to account webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum WebhookEventType {
    #[serde(rename = "account.created")]
    AccountCreated,
    #[serde(rename = "account.updated")]
    AccountUpdated,
    #[serde(rename = "account.suspended")]
    AccountSuspended,
    #[serde(rename = "account.reactivated")]
    AccountReactivated,
    #[serde(rename = "account.closed")]
    AccountClosed,
    #[serde(rename = "user.created")]
    UserCreated,
    #[serde(rename = "user.updated")]
    UserUpdated,
    #[serde(rename = "user.deleted")]
    UserDeleted,
    #[serde(rename = "role.created")]
    RoleCreated,
    #[serde(rename = "role.updated")]
    RoleUpdated,
    #[serde(rename = "role.deleted")]
    RoleDeleted,
    #[serde(rename = "api_key.created")]
    ApiKeyCreated,
    #[serde(rename = "api_key.revoked")]
    ApiKeyRevoked,
    #[serde(rename = "media.uploaded")]
    MediaUploaded,
    #[serde(rename = "media.deleted")]
    MediaDeleted,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountCreated => "account.created",
            Self::AccountUpdated => "account.updated",
            Self::AccountSuspended => "account.suspended",
            Self::AccountReactivated => "account.reactivated",
            Self::AccountClosed => "account.closed",
            Self::UserCreated => "user.created",
            Self::UserUpdated => "user.updated",
            Self::UserDeleted => "user.deleted",
            Self::RoleCreated => "role.created",
            Self::RoleUpdated => "role.updated",
            Self::RoleDeleted => "role.deleted",
            Self::ApiKeyCreated => "api_key.created",
            Self::ApiKeyRevoked => "api_key.revoked",
            Self::MediaUploaded => "media.uploaded",
            Self::MediaDeleted => "media.deleted",
        }
    }

    /// All known event types, for subscription validation.
    pub const ALL: [WebhookEventType; 15] = [
        Self::AccountCreated,
        Self::AccountUpdated,
        Self::AccountSuspended,
        Self::AccountReactivated,
        Self::AccountClosed,
        Self::UserCreated,
        Self::UserUpdated,
        Self::UserDeleted,
        Self::RoleCreated,
        Self::RoleUpdated,
        Self::RoleDeleted,
        Self::ApiKeyCreated,
        Self::ApiKeyRevoked,
        Self::MediaUploaded,
        Self::MediaDeleted,
    ];
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WebhookEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| format!("Unknown event type: {}", s))
    }
}

/// Complete webhook event payload. This envelope is what subscribers receive
/// as the request body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookEvent {
    /// Event ID. Deliveries to every subscribed endpoint carry this same ID,
    /// and retries reuse it as the Standard Webhooks message ID.
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    /// Event name (e.g., "user.created")
    pub event: String,
    /// When the event occurred
    pub occurred_at: DateTime<Utc>,
    /// Account the event belongs to
    #[schema(value_type = String, format = "uuid")]
    pub account_id: AccountId,
    /// Event-specific data
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl WebhookEvent {
    pub fn new(event_type: WebhookEventType, account_id: AccountId, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event: event_type.to_string(),
            occurred_at: Utc::now(),
            account_id,
            data,
        }
    }
}
