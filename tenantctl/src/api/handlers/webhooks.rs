use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::users::CurrentUser;
use crate::api::models::webhooks::{
    DeliveryResponse, ListDeliveriesQuery, WebhookCreate, WebhookResponse, WebhookUpdate, WebhookWithSecretResponse,
};
use crate::auth::permissions;
use crate::db::handlers::{Accounts, AuditLogs, Repository, Webhooks};
use crate::db::models::audit::AuditLogCreateDBRequest;
use crate::db::models::webhooks::{Webhook, WebhookCreateDBRequest, WebhookUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{AccountId, Operation, Resource, WebhookId};
use crate::webhooks::{signing, WebhookEventType};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

/// Check that a webhook target is an absolute http(s) URL.
fn validate_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).map_err(|e| Error::Validation {
        message: format!("Invalid webhook URL: {e}"),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::Validation {
            message: format!("Webhook URL must use http or https, got '{}'", parsed.scheme()),
        });
    }
    Ok(())
}

/// Check that every subscribed event name is a known event type.
fn validate_events(events: &[String]) -> Result<()> {
    for event in events {
        event
            .parse::<WebhookEventType>()
            .map_err(|message| Error::Validation { message })?;
    }
    Ok(())
}

/// Fetch a webhook, hiding other accounts' webhooks from non-admins.
async fn fetch_scoped_webhook(
    db: &mut sqlx::PgConnection,
    current_user: &CurrentUser,
    webhook_id: WebhookId,
) -> Result<Webhook> {
    let not_found = || Error::NotFound {
        resource: "Webhook".to_string(),
        id: webhook_id.to_string(),
    };

    let webhook = Webhooks::new(db).get_by_id(webhook_id).await?.ok_or_else(not_found)?;
    if !current_user.is_admin && webhook.account_id != current_user.account_id {
        return Err(not_found());
    }
    Ok(webhook)
}

/// Register a webhook endpoint for an account.
///
/// The response is the only place the generated secret appears in full;
/// subsequent reads return the configuration without it.
#[utoipa::path(
    post,
    path = "/accounts/{account_id}/webhooks",
    tag = "webhooks",
    summary = "Create webhook",
    description = "Register an endpoint to receive signed event deliveries. \
                   The signing secret is returned once, in this response.",
    request_body = WebhookCreate,
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 201, description = "Webhook created; body includes the secret", body = WebhookWithSecretResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Account not found"),
        (status = 422, description = "Invalid URL or unknown event type"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_webhook(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
    Json(payload): Json<WebhookCreate>,
) -> Result<(StatusCode, Json<WebhookWithSecretResponse>)> {
    permissions::require_same_account(&current_user, account_id, Resource::Webhooks, Operation::Create)?;
    permissions::require(&current_user, Resource::Webhooks, Operation::Create)?;

    validate_url(&payload.url)?;
    validate_events(&payload.events)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut tx).get_by_id(account_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Account".to_string(),
        id: account_id.to_string(),
    })?;

    let webhook = Webhooks::new(&mut tx)
        .create(&WebhookCreateDBRequest {
            account_id,
            url: payload.url,
            secret: signing::generate_secret(),
            events: payload.events,
            description: payload.description,
        })
        .await?;

    // Configuration changes are audited but not published as events
    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: "webhook.created".to_string(),
            resource_type: "webhook".to_string(),
            resource_id: Some(webhook.id.to_string()),
            details: serde_json::json!({"url": webhook.url, "events": webhook.events}),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(WebhookWithSecretResponse::from(webhook))))
}

/// List an account's webhooks, newest first.
#[utoipa::path(
    get,
    path = "/accounts/{account_id}/webhooks",
    tag = "webhooks",
    summary = "List webhooks",
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "List of webhooks, secrets omitted", body = Vec<WebhookResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_webhooks(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<WebhookResponse>>> {
    permissions::require_same_account(&current_user, account_id, Resource::Webhooks, Operation::Read)?;
    permissions::require(&current_user, Resource::Webhooks, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut pool_conn)
        .get_by_id(account_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })?;

    let webhooks = Webhooks::new(&mut pool_conn).list_by_account(account_id).await?;

    Ok(Json(webhooks.into_iter().map(WebhookResponse::from).collect()))
}

/// Get a webhook's configuration. The secret is never included.
#[utoipa::path(
    get,
    path = "/webhooks/{id}",
    tag = "webhooks",
    summary = "Get webhook",
    params(
        ("id" = uuid::Uuid, Path, description = "Webhook ID")
    ),
    responses(
        (status = 200, description = "Webhook configuration", body = WebhookResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Webhook not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<WebhookId>,
    current_user: CurrentUser,
) -> Result<Json<WebhookResponse>> {
    permissions::require(&current_user, Resource::Webhooks, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let webhook = fetch_scoped_webhook(&mut pool_conn, &current_user, webhook_id).await?;

    Ok(Json(WebhookResponse::from(webhook)))
}

/// Update a webhook's URL, event filter, description, or enabled flag.
///
/// Re-enabling a webhook clears `disabled_at` and resets the failure
/// counter, so a circuit-broken endpoint gets a fresh start.
#[utoipa::path(
    patch,
    path = "/webhooks/{id}",
    tag = "webhooks",
    summary = "Update webhook",
    request_body = WebhookUpdate,
    params(
        ("id" = uuid::Uuid, Path, description = "Webhook ID")
    ),
    responses(
        (status = 200, description = "Updated webhook", body = WebhookResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Webhook not found"),
        (status = 422, description = "Invalid URL or unknown event type"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<WebhookId>,
    current_user: CurrentUser,
    Json(payload): Json<WebhookUpdate>,
) -> Result<Json<WebhookResponse>> {
    permissions::require(&current_user, Resource::Webhooks, Operation::Update)?;

    if let Some(url) = &payload.url {
        validate_url(url)?;
    }
    if let Some(events) = &payload.events {
        validate_events(events)?;
    }

    let mut changed: Vec<&str> = Vec::new();
    if payload.url.is_some() {
        changed.push("url");
    }
    if payload.enabled.is_some() {
        changed.push("enabled");
    }
    if payload.events.is_some() {
        changed.push("events");
    }
    if payload.description.is_some() {
        changed.push("description");
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let webhook = fetch_scoped_webhook(&mut tx, &current_user, webhook_id).await?;

    let updated = Webhooks::new(&mut tx)
        .update(
            webhook.id,
            &WebhookUpdateDBRequest {
                url: payload.url,
                enabled: payload.enabled,
                events: payload.events,
                description: payload.description,
            },
        )
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Webhook".to_string(),
            id: webhook_id.to_string(),
        })?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(webhook.account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: "webhook.updated".to_string(),
            resource_type: "webhook".to_string(),
            resource_id: Some(webhook.id.to_string()),
            details: serde_json::json!({"changed": changed}),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(WebhookResponse::from(updated)))
}

/// Delete a webhook and its delivery history.
///
/// Unlike the soft-deleted aggregates, webhook removal is final: the
/// configuration and every recorded delivery are dropped together.
#[utoipa::path(
    delete,
    path = "/webhooks/{id}",
    tag = "webhooks",
    summary = "Delete webhook",
    params(
        ("id" = uuid::Uuid, Path, description = "Webhook ID")
    ),
    responses(
        (status = 204, description = "Webhook deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Webhook not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<WebhookId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    permissions::require(&current_user, Resource::Webhooks, Operation::Delete)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let webhook = fetch_scoped_webhook(&mut tx, &current_user, webhook_id).await?;

    let deleted = Webhooks::new(&mut tx).delete(webhook.id).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "Webhook".to_string(),
            id: webhook_id.to_string(),
        });
    }

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(webhook.account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: "webhook.deleted".to_string(),
            resource_type: "webhook".to_string(),
            resource_id: Some(webhook.id.to_string()),
            details: serde_json::json!({"url": webhook.url}),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Replace a webhook's signing secret.
///
/// The old secret stops signing immediately; deliveries already claimed by
/// the dispatcher may still go out under it.
#[utoipa::path(
    post,
    path = "/webhooks/{id}/rotate-secret",
    tag = "webhooks",
    summary = "Rotate webhook secret",
    description = "Generate a new signing secret. The response is the only place the new secret appears.",
    params(
        ("id" = uuid::Uuid, Path, description = "Webhook ID")
    ),
    responses(
        (status = 200, description = "Webhook with the new secret", body = WebhookWithSecretResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Webhook not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn rotate_webhook_secret(
    State(state): State<AppState>,
    Path(webhook_id): Path<WebhookId>,
    current_user: CurrentUser,
) -> Result<Json<WebhookWithSecretResponse>> {
    permissions::require(&current_user, Resource::Webhooks, Operation::Update)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let webhook = fetch_scoped_webhook(&mut tx, &current_user, webhook_id).await?;

    let rotated = Webhooks::new(&mut tx)
        .rotate_secret(webhook.id, signing::generate_secret())
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Webhook".to_string(),
            id: webhook_id.to_string(),
        })?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(webhook.account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: "webhook.secret_rotated".to_string(),
            resource_type: "webhook".to_string(),
            resource_id: Some(webhook.id.to_string()),
            details: serde_json::json!({}),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(WebhookWithSecretResponse::from(rotated)))
}

/// List a webhook's delivery attempts, newest first.
#[utoipa::path(
    get,
    path = "/webhooks/{id}/deliveries",
    tag = "webhooks",
    summary = "List webhook deliveries",
    params(
        ("id" = uuid::Uuid, Path, description = "Webhook ID"),
        ListDeliveriesQuery
    ),
    responses(
        (status = 200, description = "Paginated delivery history", body = PaginatedResponse<DeliveryResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Webhook not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_webhook_deliveries(
    State(state): State<AppState>,
    Path(webhook_id): Path<WebhookId>,
    Query(query): Query<ListDeliveriesQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<DeliveryResponse>>> {
    permissions::require(&current_user, Resource::Webhooks, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let webhook = fetch_scoped_webhook(&mut pool_conn, &current_user, webhook_id).await?;

    let (skip, limit) = query.pagination.params();
    let mut repo = Webhooks::new(&mut pool_conn);
    let deliveries = repo.list_deliveries(webhook.id, query.status, skip, limit).await?;
    let total_count = repo.count_deliveries(webhook.id, query.status).await?;

    let data = deliveries.into_iter().map(DeliveryResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}
