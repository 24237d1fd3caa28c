//! API request and response models for webhook endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::pagination::Pagination;
use crate::db::models::webhooks::{DeliveryStatus, Webhook, WebhookDelivery};
use crate::types::{AccountId, DeliveryId, WebhookId};

/// Request to create a new webhook.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WebhookCreate {
    /// HTTP(S) URL to receive webhook events
    pub url: String,
    /// Event types to receive. An empty list subscribes to every event.
    #[serde(default)]
    pub events: Vec<String>,
    /// Optional description to identify this webhook
    #[serde(default)]
    pub description: Option<String>,
}

/// Request to update a webhook.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct WebhookUpdate {
    /// New URL (optional)
    #[serde(default)]
    pub url: Option<String>,
    /// Enable/disable the webhook (optional)
    #[serde(default)]
    pub enabled: Option<bool>,
    /// New event filter (optional; an empty list subscribes to every event)
    #[serde(default)]
    pub events: Option<Vec<String>>,
    /// New description (optional)
    #[serde(default)]
    pub description: Option<Option<String>>,
}

/// Response for a webhook (secret hidden except on create/rotate).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: WebhookId,
    #[schema(value_type = String, format = "uuid")]
    pub account_id: AccountId,
    pub url: String,
    pub enabled: bool,
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub consecutive_failures: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_at: Option<DateTime<Utc>>,
}

impl From<Webhook> for WebhookResponse {
    fn from(webhook: Webhook) -> Self {
        Self {
            id: webhook.id,
            account_id: webhook.account_id,
            url: webhook.url,
            enabled: webhook.enabled,
            events: webhook.events,
            description: webhook.description,
            created_at: webhook.created_at,
            updated_at: webhook.updated_at,
            consecutive_failures: webhook.consecutive_failures,
            disabled_at: webhook.disabled_at,
        }
    }
}

/// Response for webhook create/rotate that includes the secret (shown only once).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookWithSecretResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: WebhookId,
    #[schema(value_type = String, format = "uuid")]
    pub account_id: AccountId,
    pub url: String,
    /// The webhook secret (only shown on create and rotate operations)
    pub secret: String,
    pub enabled: bool,
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Webhook> for WebhookWithSecretResponse {
    fn from(webhook: Webhook) -> Self {
        Self {
            id: webhook.id,
            account_id: webhook.account_id,
            url: webhook.url,
            secret: webhook.secret,
            enabled: webhook.enabled,
            events: webhook.events,
            description: webhook.description,
            created_at: webhook.created_at,
            updated_at: webhook.updated_at,
        }
    }
}

/// A delivery attempt record for a webhook.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DeliveryId,
    #[schema(value_type = String, format = "uuid")]
    pub webhook_id: WebhookId,
    /// Stable message ID, shared by every retry of the same event.
    #[schema(value_type = String, format = "uuid")]
    pub event_id: Uuid,
    pub event_type: String,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub attempt_count: i32,
    pub next_attempt_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WebhookDelivery> for DeliveryResponse {
    fn from(delivery: WebhookDelivery) -> Self {
        let status = delivery.delivery_status();
        Self {
            id: delivery.id,
            webhook_id: delivery.webhook_id,
            event_id: delivery.event_id,
            event_type: delivery.event_type,
            payload: delivery.payload,
            status,
            attempt_count: delivery.attempt_count,
            next_attempt_at: delivery.next_attempt_at,
            last_status_code: delivery.last_status_code,
            last_error: delivery.last_error,
            created_at: delivery.created_at,
            updated_at: delivery.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListDeliveriesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    pub status: Option<DeliveryStatus>,
}
