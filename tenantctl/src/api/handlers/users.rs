use super::roles::fetch_scoped_role;
use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::roles::RoleResponse;
use crate::api::models::users::{CurrentUser, ListUsersQuery, UserCreate, UserResponse, UserStatus, UserUpdate};
use crate::auth::{password, permissions};
use crate::config::Config;
use crate::db::handlers::{users::UserFilter, Accounts, AuditLogs, Repository, Roles, Users};
use crate::db::models::audit::AuditLogCreateDBRequest;
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{AccountId, Operation, Resource, RoleId, UserId};
use crate::webhooks::{events::WebhookEventType, publisher};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

fn validate_password(password: &str, config: &Config) -> Result<()> {
    let policy = &config.auth.password;
    if password.len() < policy.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", policy.min_length),
        });
    }
    if password.len() > policy.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", policy.max_length),
        });
    }
    Ok(())
}

async fn hash_password(password: String) -> Result<String> {
    // Argon2 is deliberately slow; keep it off the async runtime
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Fetch a user, hiding other accounts' users from non-admins.
pub(crate) async fn fetch_scoped_user(
    db: &mut sqlx::PgConnection,
    current_user: &CurrentUser,
    user_id: UserId,
) -> Result<UserDBResponse> {
    let not_found = || Error::NotFound {
        resource: "User".to_string(),
        id: user_id.to_string(),
    };

    let user = Users::new(db).get_by_id(user_id).await?.ok_or_else(not_found)?;
    if !current_user.is_admin && user.account_id != current_user.account_id {
        return Err(not_found());
    }
    Ok(user)
}

#[utoipa::path(
    post,
    path = "/accounts/{account_id}/users",
    tag = "users",
    summary = "Create user",
    description = "Create a user in an account. Users created without a password start as invited.",
    request_body = UserCreate,
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 201, description = "User created successfully", body = UserResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Username or email already taken"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    permissions::require_same_account(&current_user, account_id, Resource::Users, Operation::Create)?;
    permissions::require(&current_user, Resource::Users, Operation::Create)?;

    if create.username.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Username cannot be empty".to_string(),
        });
    }
    if create.email.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Email cannot be empty".to_string(),
        });
    }

    let password_hash = match create.password.clone() {
        Some(password) => {
            validate_password(&password, &state.config)?;
            Some(hash_password(password).await?)
        }
        None => None,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut tx)
        .get_by_id(account_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })?;

    let request = UserCreateDBRequest::from_api(account_id, create, password_hash);
    let user = Users::new(&mut tx).create(&request).await?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::UserCreated.to_string(),
            resource_type: "user".to_string(),
            resource_id: Some(user.id.to_string()),
            details: serde_json::json!({"username": user.username, "email": user.email, "status": user.status}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        account_id,
        WebhookEventType::UserCreated,
        serde_json::json!({"user_id": user.id, "account_id": account_id, "username": user.username, "status": user.status}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    get,
    path = "/accounts/{account_id}/users",
    tag = "users",
    summary = "List users",
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID"),
        ListUsersQuery
    ),
    responses(
        (status = 200, description = "Paginated list of users", body = PaginatedResponse<UserResponse>),
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
pub async fn list_users(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<ListUsersQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    permissions::require_same_account(&current_user, account_id, Resource::Users, Operation::Read)?;
    permissions::require(&current_user, Resource::Users, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut pool_conn)
        .get_by_id(account_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })?;

    let (skip, limit) = query.pagination.params();
    let filter = UserFilter {
        account_id: Some(account_id),
        status: query.status,
        skip,
        limit,
    };

    let mut repo = Users::new(&mut pool_conn);
    let users = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Get user",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<UserResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = fetch_scoped_user(&mut pool_conn, &current_user, user_id).await?;

    // Users can always read themselves
    if user.id != current_user.id {
        permissions::require(&current_user, Resource::Users, Operation::Read)?;
    }

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Update user",
    description = "Update a user. Setting a password on an invited user activates them.",
    request_body = UserUpdate,
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User updated successfully", body = UserResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let user = fetch_scoped_user(&mut tx, &current_user, user_id).await?;

    // Self-service covers display name and password; status changes need the
    // users permission even on yourself.
    let is_self = user.id == current_user.id;
    if !is_self || update.status.is_some() {
        permissions::require(&current_user, Resource::Users, Operation::Update)?;
    }

    let UserUpdate {
        display_name,
        password,
        status,
    } = update;

    let mut changed: Vec<&str> = Vec::new();
    if display_name.is_some() {
        changed.push("display_name");
    }
    if password.is_some() {
        changed.push("password");
    }
    if status.is_some() {
        changed.push("status");
    }

    let password_hash = match password {
        Some(password) => {
            validate_password(&password, &state.config)?;
            Some(hash_password(password).await?)
        }
        None => None,
    };

    let mut request = UserUpdateDBRequest {
        display_name,
        status,
        password_hash,
    };

    // A first password activates an invited user unless the caller pins a status
    if user.status == UserStatus::Invited && request.password_hash.is_some() && request.status.is_none() {
        request.status = Some(UserStatus::Active);
    }

    let user = Users::new(&mut tx).update(user_id, &request).await?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(user.account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::UserUpdated.to_string(),
            resource_type: "user".to_string(),
            resource_id: Some(user.id.to_string()),
            // Field names only; secrets never reach the trail
            details: serde_json::json!({"changed": changed}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        user.account_id,
        WebhookEventType::UserUpdated,
        serde_json::json!({"user_id": user.id, "account_id": user.account_id, "status": user.status}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Delete user",
    description = "Soft-delete a user. Users cannot delete themselves.",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Cannot delete yourself"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let user = fetch_scoped_user(&mut tx, &current_user, user_id).await?;

    if user.id == current_user.id {
        return Err(Error::Validation {
            message: "You cannot delete your own user".to_string(),
        });
    }
    permissions::require(&current_user, Resource::Users, Operation::Delete)?;

    let deleted = Users::new(&mut tx).delete(user_id).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        });
    }

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(user.account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::UserDeleted.to_string(),
            resource_type: "user".to_string(),
            resource_id: Some(user.id.to_string()),
            details: serde_json::json!({"username": user.username, "email": user.email}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        user.account_id,
        WebhookEventType::UserDeleted,
        serde_json::json!({"user_id": user.id, "account_id": user.account_id}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/roles",
    tag = "users",
    summary = "List a user's roles",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Roles assigned to the user", body = Vec<RoleResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<RoleResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = fetch_scoped_user(&mut pool_conn, &current_user, user_id).await?;

    if user.id != current_user.id {
        permissions::require(&current_user, Resource::Users, Operation::Read)?;
    }

    let roles = Roles::new(&mut pool_conn).roles_for_user(user_id).await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

#[utoipa::path(
    put,
    path = "/users/{user_id}/roles/{role_id}",
    tag = "users",
    summary = "Assign role to user",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID"),
        ("role_id" = uuid::Uuid, Path, description = "Role ID")
    ),
    responses(
        (status = 204, description = "Role assigned"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User or role not found"),
        (status = 409, description = "Role already assigned"),
        (status = 422, description = "Role belongs to a different account"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn assign_role(
    State(state): State<AppState>,
    Path((user_id, role_id)): Path<(UserId, RoleId)>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let user = fetch_scoped_user(&mut tx, &current_user, user_id).await?;
    permissions::require(&current_user, Resource::Users, Operation::Update)?;

    let role = fetch_scoped_role(&mut tx, &current_user, role_id).await?;

    match role.account_id {
        // Platform-wide roles are handed out by operators only
        None => permissions::require_admin(&current_user, Resource::Roles, Operation::Update)?,
        Some(role_account) if role_account != user.account_id => {
            return Err(Error::Validation {
                message: "Role belongs to a different account".to_string(),
            });
        }
        Some(_) => {}
    }

    Roles::new(&mut tx).assign_to_user(role_id, user_id).await?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(user.account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: "user.role_assigned".to_string(),
            resource_type: "user".to_string(),
            resource_id: Some(user.id.to_string()),
            details: serde_json::json!({"role_id": role.id, "role_name": role.name}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        user.account_id,
        WebhookEventType::UserUpdated,
        serde_json::json!({"user_id": user.id, "account_id": user.account_id, "role_id": role.id}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}/roles/{role_id}",
    tag = "users",
    summary = "Remove role from user",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID"),
        ("role_id" = uuid::Uuid, Path, description = "Role ID")
    ),
    responses(
        (status = 204, description = "Role removed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User, role or assignment not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn remove_role(
    State(state): State<AppState>,
    Path((user_id, role_id)): Path<(UserId, RoleId)>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let user = fetch_scoped_user(&mut tx, &current_user, user_id).await?;
    permissions::require(&current_user, Resource::Users, Operation::Update)?;

    let role = fetch_scoped_role(&mut tx, &current_user, role_id).await?;
    if role.account_id.is_none() {
        permissions::require_admin(&current_user, Resource::Roles, Operation::Update)?;
    }

    let removed = Roles::new(&mut tx).remove_from_user(role_id, user_id).await?;
    if !removed {
        return Err(Error::NotFound {
            resource: "Role assignment".to_string(),
            id: role_id.to_string(),
        });
    }

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(user.account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: "user.role_removed".to_string(),
            resource_type: "user".to_string(),
            resource_id: Some(user.id.to_string()),
            details: serde_json::json!({"role_id": role.id, "role_name": role.name}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        user.account_id,
        WebhookEventType::UserUpdated,
        serde_json::json!({"user_id": user.id, "account_id": user.account_id, "role_id": role.id}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}
