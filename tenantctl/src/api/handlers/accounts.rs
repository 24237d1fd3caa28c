use crate::api::models::accounts::{AccountCreate, AccountResponse, AccountStatus, AccountUpdate, ListAccountsQuery};
use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::users::CurrentUser;
use crate::auth::permissions;
use crate::db::handlers::{accounts::AccountFilter, Accounts, AuditLogs, Repository};
use crate::db::models::accounts::{AccountCreateDBRequest, AccountUpdateDBRequest};
use crate::db::models::audit::AuditLogCreateDBRequest;
use crate::errors::{Error, Result};
use crate::types::{AccountId, Operation, Resource};
use crate::webhooks::{events::WebhookEventType, publisher};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(Error::Validation {
            message: format!("Invalid slug '{slug}': only lowercase letters, digits and dashes are allowed"),
        });
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/accounts",
    tag = "accounts",
    summary = "Create account",
    request_body = AccountCreate,
    responses(
        (status = 201, description = "Account created successfully", body = AccountResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - platform operators only"),
        (status = 409, description = "Slug already taken"),
        (status = 422, description = "Invalid slug"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_account(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<AccountCreate>,
) -> Result<(StatusCode, Json<AccountResponse>)> {
    permissions::require_admin(&current_user, Resource::Accounts, Operation::Create)?;

    if create.name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Account name cannot be empty".to_string(),
        });
    }

    let request = AccountCreateDBRequest::from(create);
    validate_slug(&request.slug)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let account = Accounts::new(&mut tx).create(&request).await?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account.id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::AccountCreated.to_string(),
            resource_type: "account".to_string(),
            resource_id: Some(account.id.to_string()),
            details: serde_json::json!({"name": account.name, "slug": account.slug}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        account.id,
        WebhookEventType::AccountCreated,
        serde_json::json!({"account_id": account.id, "name": account.name, "slug": account.slug}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

#[utoipa::path(
    get,
    path = "/accounts",
    tag = "accounts",
    summary = "List accounts",
    params(ListAccountsQuery),
    responses(
        (status = 200, description = "Paginated list of accounts", body = PaginatedResponse<AccountResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - platform operators only"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListAccountsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<AccountResponse>>> {
    permissions::require_admin(&current_user, Resource::Accounts, Operation::Read)?;

    let (skip, limit) = query.pagination.params();
    let filter = AccountFilter {
        status: query.status,
        skip,
        limit,
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Accounts::new(&mut pool_conn);

    let accounts = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = accounts.into_iter().map(AccountResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/accounts/{account_id}",
    tag = "accounts",
    summary = "Get account",
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Account details", body = AccountResponse),
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
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
) -> Result<Json<AccountResponse>> {
    // Members see other accounts as absent rather than forbidden
    if !current_user.is_admin && account_id != current_user.account_id {
        return Err(Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        });
    }
    permissions::require(&current_user, Resource::Accounts, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match Accounts::new(&mut pool_conn).get_by_id(account_id).await? {
        Some(account) => Ok(Json(AccountResponse::from(account))),
        None => Err(Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        }),
    }
}

#[utoipa::path(
    patch,
    path = "/accounts/{account_id}",
    tag = "accounts",
    summary = "Update account",
    request_body = AccountUpdate,
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Account updated successfully", body = AccountResponse),
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
pub async fn update_account(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
    Json(update): Json<AccountUpdate>,
) -> Result<Json<AccountResponse>> {
    if !current_user.is_admin && account_id != current_user.account_id {
        return Err(Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        });
    }
    permissions::require(&current_user, Resource::Accounts, Operation::Update)?;

    let details = serde_json::to_value(&update).map_err(anyhow::Error::from)?;
    let request = AccountUpdateDBRequest::from(update);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let account = Accounts::new(&mut tx).update(account_id, &request).await?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account.id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::AccountUpdated.to_string(),
            resource_type: "account".to_string(),
            resource_id: Some(account.id.to_string()),
            details,
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        account.id,
        WebhookEventType::AccountUpdated,
        serde_json::json!({"account_id": account.id}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(AccountResponse::from(account)))
}

#[utoipa::path(
    post,
    path = "/accounts/{account_id}/suspend",
    tag = "accounts",
    summary = "Suspend account",
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Account suspended", body = AccountResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - platform operators only"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn suspend_account(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
) -> Result<Json<AccountResponse>> {
    permissions::require_admin(&current_user, Resource::Accounts, Operation::Update)?;

    set_account_status(&state, &current_user, account_id, AccountStatus::Suspended, WebhookEventType::AccountSuspended).await
}

#[utoipa::path(
    post,
    path = "/accounts/{account_id}/reactivate",
    tag = "accounts",
    summary = "Reactivate account",
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Account reactivated", body = AccountResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - platform operators only"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reactivate_account(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
) -> Result<Json<AccountResponse>> {
    permissions::require_admin(&current_user, Resource::Accounts, Operation::Update)?;

    set_account_status(&state, &current_user, account_id, AccountStatus::Active, WebhookEventType::AccountReactivated).await
}

async fn set_account_status(
    state: &AppState,
    current_user: &CurrentUser,
    account_id: AccountId,
    status: AccountStatus,
    event: WebhookEventType,
) -> Result<Json<AccountResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let account = Accounts::new(&mut tx)
        .set_status(account_id, status)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account.id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: event.to_string(),
            resource_type: "account".to_string(),
            resource_id: Some(account.id.to_string()),
            details: serde_json::json!({"status": status}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        account.id,
        event,
        serde_json::json!({"account_id": account.id, "status": status}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(AccountResponse::from(account)))
}

#[utoipa::path(
    delete,
    path = "/accounts/{account_id}",
    tag = "accounts",
    summary = "Close account",
    description = "Close an account: soft-delete it and retire its users",
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 204, description = "Account closed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - platform operators only"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_account(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    permissions::require_admin(&current_user, Resource::Accounts, Operation::Delete)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let account = Accounts::new(&mut tx)
        .get_by_id(account_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })?;

    Accounts::new(&mut tx).delete(account_id).await?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account.id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::AccountClosed.to_string(),
            resource_type: "account".to_string(),
            resource_id: Some(account.id.to_string()),
            details: serde_json::json!({"name": account.name}),
        })
        .await?;

    // Final event so subscribers learn the account is gone
    publisher::publish_event(
        &mut tx,
        account.id,
        WebhookEventType::AccountClosed,
        serde_json::json!({"account_id": account.id}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}
