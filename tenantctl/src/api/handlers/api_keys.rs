use super::users::fetch_scoped_user;
use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::requests::{ApiRequestResponse, ListRequestsQuery};
use crate::{
    api::models::{
        api_keys::{ApiKeyCreate, ApiKeyInfoResponse, ApiKeyResponse, ApiKeyStatus, ListApiKeysQuery},
        users::CurrentUser,
    },
    auth::permissions,
    db::handlers::{api_keys::ApiKeyFilter, requests::ApiRequestFilter, ApiKeys, ApiRequests, AuditLogs, Repository, Users},
    db::models::{api_keys::ApiKeyCreateDBRequest, audit::AuditLogCreateDBRequest},
    errors::{Error, Result},
    types::{AccountId, ApiKeyId, Operation, Resource, UserId, UserIdOrCurrent},
    webhooks::{events::WebhookEventType, publisher},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

/// Resolve the `{user_id}` path segment to a target user and their account.
///
/// Own keys are self-service and need no role. Anyone else's keys need the
/// api_keys permission, and non-admins never see users outside their account.
async fn resolve_target_user(
    db: &mut sqlx::PgConnection,
    current_user: &CurrentUser,
    user_id: UserIdOrCurrent,
    operation: Operation,
) -> Result<(UserId, AccountId)> {
    let target = match user_id {
        UserIdOrCurrent::Current(_) => current_user.id,
        UserIdOrCurrent::Id(id) => id,
    };

    if target == current_user.id {
        return Ok((current_user.id, current_user.account_id));
    }

    let user = fetch_scoped_user(db, current_user, target).await?;
    permissions::require(current_user, Resource::ApiKeys, operation)?;
    Ok((user.id, user.account_id))
}

/// Create an API key for the current user or a specified user.
///
/// This is the only time the full secret appears in a response; listings and
/// reads return a masked prefix.
#[utoipa::path(
    post,
    path = "/users/{user_id}/api-keys",
    tag = "api_keys",
    summary = "Create API key",
    description = "Create an API key for the current user or a specified user",
    request_body = ApiKeyCreate,
    params(
        ("user_id" = String, Path, description = "User ID (UUID) or 'current' for the current user"),
    ),
    responses(
        (status = 201, description = "API key created successfully", body = ApiKeyResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - can only manage own API keys without the api_keys permission"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user_api_key(
    State(state): State<AppState>,
    Path(user_id): Path<UserIdOrCurrent>,
    current_user: CurrentUser,
    Json(create): Json<ApiKeyCreate>,
) -> Result<(StatusCode, Json<ApiKeyResponse>)> {
    if create.name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "API key name cannot be empty".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (target_user_id, account_id) = resolve_target_user(&mut tx, &current_user, user_id, Operation::Create).await?;

    let request = ApiKeyCreateDBRequest::from_api(target_user_id, create);
    let key = ApiKeys::new(&mut tx).create(&request).await?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::ApiKeyCreated.to_string(),
            resource_type: "api_key".to_string(),
            resource_id: Some(key.id.to_string()),
            details: serde_json::json!({"name": key.name, "user_id": key.user_id}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        account_id,
        WebhookEventType::ApiKeyCreated,
        serde_json::json!({"api_key_id": key.id, "user_id": key.user_id, "name": key.name}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(ApiKeyResponse::from(key))))
}

/// List API keys for the current user or a specified user. Secrets are masked.
#[utoipa::path(
    get,
    path = "/users/{user_id}/api-keys",
    tag = "api_keys",
    summary = "List API keys",
    description = "List API keys for the current user or a specified user",
    params(
        ("user_id" = String, Path, description = "User ID (UUID) or 'current' for the current user"),
        ListApiKeysQuery
    ),
    responses(
        (status = 200, description = "Paginated list of API keys", body = PaginatedResponse<ApiKeyInfoResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - can only view own API keys without the api_keys permission"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_user_api_keys(
    State(state): State<AppState>,
    Path(user_id): Path<UserIdOrCurrent>,
    Query(query): Query<ListApiKeysQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<ApiKeyInfoResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let (target_user_id, _) = resolve_target_user(&mut pool_conn, &current_user, user_id, Operation::Read).await?;

    let (skip, limit) = query.pagination.params();
    let filter = ApiKeyFilter {
        user_id: Some(target_user_id),
        status: query.status,
        skip,
        limit,
    };

    let mut repo = ApiKeys::new(&mut pool_conn);
    let keys = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = keys.into_iter().map(ApiKeyInfoResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Get a specific API key for the current user or a specified user.
#[utoipa::path(
    get,
    path = "/users/{user_id}/api-keys/{id}",
    tag = "api_keys",
    summary = "Get API key",
    description = "Get a specific API key for the current user or a specified user",
    params(
        ("user_id" = String, Path, description = "User ID (UUID) or 'current' for the current user"),
        ("id" = uuid::Uuid, Path, description = "API key ID"),
    ),
    responses(
        (status = 200, description = "API key information", body = ApiKeyInfoResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - can only view own API keys without the api_keys permission"),
        (status = 404, description = "API key not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user_api_key(
    State(state): State<AppState>,
    Path((user_id, api_key_id)): Path<(UserIdOrCurrent, ApiKeyId)>,
    current_user: CurrentUser,
) -> Result<Json<ApiKeyInfoResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let (target_user_id, _) = resolve_target_user(&mut pool_conn, &current_user, user_id, Operation::Read).await?;

    // Keys belonging to someone else look absent
    let key = ApiKeys::new(&mut pool_conn)
        .get_by_id(api_key_id)
        .await?
        .filter(|key| key.user_id == target_user_id)
        .ok_or_else(|| Error::NotFound {
            resource: "API key".to_string(),
            id: api_key_id.to_string(),
        })?;

    Ok(Json(ApiKeyInfoResponse::from(key)))
}

/// Revoke an API key. Revocation is permanent; the key row is kept so its
/// request history stays attributable.
#[utoipa::path(
    delete,
    path = "/users/{user_id}/api-keys/{id}",
    tag = "api_keys",
    summary = "Revoke API key",
    description = "Revoke a specific API key for the current user or a specified user",
    params(
        ("user_id" = String, Path, description = "User ID (UUID) or 'current' for the current user"),
        ("id" = uuid::Uuid, Path, description = "API key ID"),
    ),
    responses(
        (status = 204, description = "API key revoked"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - can only revoke own API keys without the api_keys permission"),
        (status = 404, description = "API key not found"),
        (status = 409, description = "API key is already revoked"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user_api_key(
    State(state): State<AppState>,
    Path((user_id, api_key_id)): Path<(UserIdOrCurrent, ApiKeyId)>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (target_user_id, account_id) = resolve_target_user(&mut tx, &current_user, user_id, Operation::Delete).await?;

    let key = ApiKeys::new(&mut tx)
        .get_by_id(api_key_id)
        .await?
        .filter(|key| key.user_id == target_user_id)
        .ok_or_else(|| Error::NotFound {
            resource: "API key".to_string(),
            id: api_key_id.to_string(),
        })?;

    let revoked = ApiKeys::new(&mut tx).delete(key.id).await?;
    if !revoked {
        return Err(Error::Conflict {
            message: "API key is already revoked".to_string(),
        });
    }

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::ApiKeyRevoked.to_string(),
            resource_type: "api_key".to_string(),
            resource_id: Some(key.id.to_string()),
            details: serde_json::json!({"name": key.name, "user_id": key.user_id}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        account_id,
        WebhookEventType::ApiKeyRevoked,
        serde_json::json!({"api_key_id": key.id, "user_id": key.user_id}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

/// List the request log for one API key.
#[utoipa::path(
    get,
    path = "/api-keys/{api_key_id}/requests",
    tag = "api_keys",
    summary = "List API key requests",
    description = "List the recorded requests made with one API key",
    params(
        ("api_key_id" = uuid::Uuid, Path, description = "API key ID"),
        ListRequestsQuery
    ),
    responses(
        (status = 200, description = "Paginated request log", body = PaginatedResponse<ApiRequestResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "API key not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_api_key_requests(
    State(state): State<AppState>,
    Path(api_key_id): Path<ApiKeyId>,
    Query(query): Query<ListRequestsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<ApiRequestResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let not_found = || Error::NotFound {
        resource: "API key".to_string(),
        id: api_key_id.to_string(),
    };

    let key = ApiKeys::new(&mut pool_conn).get_by_id(api_key_id).await?.ok_or_else(not_found)?;

    // Own keys are self-service; anyone else's usage needs the requests
    // permission and the owner in scope.
    if key.user_id != current_user.id {
        let owner = Users::new(&mut pool_conn).get_by_id(key.user_id).await?;
        let in_scope = match &owner {
            Some(owner) => current_user.is_admin || owner.account_id == current_user.account_id,
            // The owner row is soft-deleted; only operators can still attribute it
            None => current_user.is_admin,
        };
        if !in_scope {
            return Err(not_found());
        }
        permissions::require(&current_user, Resource::Requests, Operation::Read)?;
    }

    let (skip, limit) = query.pagination.params();
    let filter = ApiRequestFilter {
        api_key_id: Some(api_key_id),
        user_id: None,
        from: query.from,
        to: query.to,
        skip,
        limit,
    };

    let mut repo = ApiRequests::new(&mut pool_conn);
    let requests = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = requests.into_iter().map(ApiRequestResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}
