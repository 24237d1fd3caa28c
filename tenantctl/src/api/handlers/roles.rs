use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::roles::{ListRolesQuery, RoleCreate, RoleResponse, RoleUpdate};
use crate::api::models::users::CurrentUser;
use crate::auth::permissions;
use crate::db::handlers::{roles::RoleFilter, Accounts, AuditLogs, Repository, Roles};
use crate::db::models::audit::AuditLogCreateDBRequest;
use crate::db::models::roles::{RoleCreateDBRequest, RoleDBResponse, RoleUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{AccountId, Operation, Permission, Resource, RoleId};
use crate::webhooks::{events::WebhookEventType, publisher};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

fn validate_permissions(permissions: &[String]) -> Result<()> {
    for permission in permissions {
        permission
            .parse::<Permission>()
            .map_err(|e| Error::Validation { message: e.to_string() })?;
    }
    Ok(())
}

/// Fetch a role, hiding other accounts' roles from non-admins. Platform-wide
/// roles are visible to everyone.
pub(crate) async fn fetch_scoped_role(
    db: &mut sqlx::PgConnection,
    current_user: &CurrentUser,
    role_id: RoleId,
) -> Result<RoleDBResponse> {
    let not_found = || Error::NotFound {
        resource: "Role".to_string(),
        id: role_id.to_string(),
    };

    let role = Roles::new(db).get_by_id(role_id).await?.ok_or_else(not_found)?;
    if let Some(role_account) = role.account_id {
        if !current_user.is_admin && role_account != current_user.account_id {
            return Err(not_found());
        }
    }
    Ok(role)
}

#[utoipa::path(
    post,
    path = "/accounts/{account_id}/roles",
    tag = "roles",
    summary = "Create role",
    request_body = RoleCreate,
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 201, description = "Role created successfully", body = RoleResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Role name already taken"),
        (status = 422, description = "Invalid permission string"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_role(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
    Json(create): Json<RoleCreate>,
) -> Result<(StatusCode, Json<RoleResponse>)> {
    permissions::require_same_account(&current_user, account_id, Resource::Roles, Operation::Create)?;
    permissions::require(&current_user, Resource::Roles, Operation::Create)?;

    if create.name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Role name cannot be empty".to_string(),
        });
    }
    validate_permissions(&create.permissions)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut tx)
        .get_by_id(account_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })?;

    let request = RoleCreateDBRequest::from_api(account_id, create);
    let role = Roles::new(&mut tx).create(&request).await?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::RoleCreated.to_string(),
            resource_type: "role".to_string(),
            resource_id: Some(role.id.to_string()),
            details: serde_json::json!({"name": role.name, "permissions": role.permissions}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        account_id,
        WebhookEventType::RoleCreated,
        serde_json::json!({"role_id": role.id, "account_id": account_id, "name": role.name}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

#[utoipa::path(
    get,
    path = "/accounts/{account_id}/roles",
    tag = "roles",
    summary = "List roles",
    description = "List an account's roles. Platform-wide roles are included.",
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID"),
        ListRolesQuery
    ),
    responses(
        (status = 200, description = "Paginated list of roles", body = PaginatedResponse<RoleResponse>),
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
pub async fn list_roles(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<ListRolesQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<RoleResponse>>> {
    permissions::require_same_account(&current_user, account_id, Resource::Roles, Operation::Read)?;
    permissions::require(&current_user, Resource::Roles, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut pool_conn)
        .get_by_id(account_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })?;

    let (skip, limit) = query.pagination.params();
    let filter = RoleFilter {
        account_id: Some(account_id),
        skip,
        limit,
    };

    let mut repo = Roles::new(&mut pool_conn);
    let roles = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = roles.into_iter().map(RoleResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/roles/{role_id}",
    tag = "roles",
    summary = "Get role",
    params(
        ("role_id" = uuid::Uuid, Path, description = "Role ID")
    ),
    responses(
        (status = 200, description = "Role details", body = RoleResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Role not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<RoleId>,
    current_user: CurrentUser,
) -> Result<Json<RoleResponse>> {
    permissions::require(&current_user, Resource::Roles, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let role = fetch_scoped_role(&mut pool_conn, &current_user, role_id).await?;

    Ok(Json(RoleResponse::from(role)))
}

#[utoipa::path(
    patch,
    path = "/roles/{role_id}",
    tag = "roles",
    summary = "Update role",
    request_body = RoleUpdate,
    params(
        ("role_id" = uuid::Uuid, Path, description = "Role ID")
    ),
    responses(
        (status = 200, description = "Role updated successfully", body = RoleResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role name already taken"),
        (status = 422, description = "Invalid permission string"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<RoleId>,
    current_user: CurrentUser,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<RoleResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let role = fetch_scoped_role(&mut tx, &current_user, role_id).await?;

    permissions::require(&current_user, Resource::Roles, Operation::Update)?;
    if role.account_id.is_none() {
        // Platform-wide roles are operator territory
        permissions::require_admin(&current_user, Resource::Roles, Operation::Update)?;
    }

    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Role name cannot be empty".to_string(),
            });
        }
    }
    if let Some(permissions) = &update.permissions {
        validate_permissions(permissions)?;
    }

    let details = serde_json::to_value(&update).map_err(anyhow::Error::from)?;
    let request = RoleUpdateDBRequest::from(update);

    let role = Roles::new(&mut tx).update(role_id, &request).await?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: role.account_id,
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::RoleUpdated.to_string(),
            resource_type: "role".to_string(),
            resource_id: Some(role.id.to_string()),
            details,
        })
        .await?;

    // Platform-wide roles have no account to notify
    if let Some(account_id) = role.account_id {
        publisher::publish_event(
            &mut tx,
            account_id,
            WebhookEventType::RoleUpdated,
            serde_json::json!({"role_id": role.id, "account_id": account_id}),
        )
        .await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(RoleResponse::from(role)))
}

#[utoipa::path(
    delete,
    path = "/roles/{role_id}",
    tag = "roles",
    summary = "Delete role",
    description = "Delete a role and its assignments. System roles cannot be deleted.",
    params(
        ("role_id" = uuid::Uuid, Path, description = "Role ID")
    ),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Role not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<RoleId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let role = fetch_scoped_role(&mut tx, &current_user, role_id).await?;

    permissions::require(&current_user, Resource::Roles, Operation::Delete)?;
    if role.account_id.is_none() {
        permissions::require_admin(&current_user, Resource::Roles, Operation::Delete)?;
    }

    let deleted = Roles::new(&mut tx).delete(role_id).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "Role".to_string(),
            id: role_id.to_string(),
        });
    }

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: role.account_id,
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::RoleDeleted.to_string(),
            resource_type: "role".to_string(),
            resource_id: Some(role.id.to_string()),
            details: serde_json::json!({"name": role.name}),
        })
        .await?;

    if let Some(account_id) = role.account_id {
        publisher::publish_event(
            &mut tx,
            account_id,
            WebhookEventType::RoleDeleted,
            serde_json::json!({"role_id": role.id, "account_id": account_id}),
        )
        .await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::users::UserStatus,
        db::{
            handlers::{ApiKeys, Users, Webhooks, audit::AuditLogFilter},
            models::{
                accounts::AccountCreateDBRequest,
                api_keys::ApiKeyCreateDBRequest,
                users::UserCreateDBRequest,
                webhooks::WebhookCreateDBRequest,
            },
        },
        test_utils::create_test_config,
        types::UserId,
        webhooks::signing,
    };
    use axum_test::TestServer;
    use sqlx::PgPool;

    fn test_server(pool: &PgPool) -> TestServer {
        let state = AppState::builder().db(pool.clone()).config(create_test_config()).build();

        let app = axum::Router::new()
            .route(
                "/accounts/{account_id}/roles",
                axum::routing::post(create_role).get(list_roles),
            )
            .route(
                "/roles/{role_id}",
                axum::routing::get(get_role).patch(update_role).delete(delete_role),
            )
            .with_state(state);

        TestServer::new(app).unwrap()
    }

    async fn seed_account(pool: &PgPool, slug: &str) -> AccountId {
        let mut conn = pool.acquire().await.unwrap();
        Accounts::new(&mut conn)
            .create(&AccountCreateDBRequest {
                name: slug.to_string(),
                slug: slug.to_string(),
                plan: "free".to_string(),
                contact_email: None,
                settings: serde_json::json!({}),
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_user(pool: &PgPool, account_id: AccountId, username: &str, is_admin: bool) -> UserId {
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                account_id,
                username: username.to_string(),
                email: format!("{username}@example.com"),
                display_name: None,
                status: UserStatus::Active,
                is_admin,
                password_hash: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_api_key(pool: &PgPool, user_id: UserId) -> String {
        let mut conn = pool.acquire().await.unwrap();
        ApiKeys::new(&mut conn)
            .create(&ApiKeyCreateDBRequest {
                user_id,
                name: "test key".to_string(),
                expires_at: None,
            })
            .await
            .unwrap()
            .secret
    }

    async fn seed_operator(pool: &PgPool) -> String {
        let account_id = seed_account(pool, "platform").await;
        let user_id = seed_user(pool, account_id, "root", true).await;
        seed_api_key(pool, user_id).await
    }

    async fn seed_member(pool: &PgPool, account_id: AccountId, username: &str, permissions: Vec<String>) -> String {
        let user_id = seed_user(pool, account_id, username, false).await;
        if !permissions.is_empty() {
            let mut conn = pool.acquire().await.unwrap();
            let mut roles = Roles::new(&mut conn);
            let role = roles
                .create(&RoleCreateDBRequest {
                    account_id: Some(account_id),
                    name: format!("{username}-role"),
                    description: None,
                    permissions,
                    is_system: false,
                })
                .await
                .unwrap();
            roles.assign_to_user(role.id, user_id).await.unwrap();
        }
        seed_api_key(pool, user_id).await
    }

    async fn seed_role(pool: &PgPool, account_id: Option<AccountId>, name: &str, is_system: bool) -> RoleId {
        let mut conn = pool.acquire().await.unwrap();
        Roles::new(&mut conn)
            .create(&RoleCreateDBRequest {
                account_id,
                name: name.to_string(),
                description: None,
                permissions: vec!["media:read".to_string()],
                is_system,
            })
            .await
            .unwrap()
            .id
    }

    fn bearer(secret: &str) -> (String, String) {
        ("authorization".to_string(), format!("Bearer {secret}"))
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_role(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let manager = seed_member(&pool, account_id, "manager", vec!["roles:write".to_string()]).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&manager);
        let response = server
            .post(&format!("/accounts/{account_id}/roles"))
            .add_header(name, value)
            .json(&serde_json::json!({
                "name": "editor",
                "description": "Can manage media",
                "permissions": ["media:write"]
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let role: RoleResponse = response.json();
        assert_eq!(role.name, "editor");
        assert_eq!(role.account_id, Some(account_id));
        assert!(!role.is_system);
        assert_eq!(role.permissions, vec!["media:write".to_string()]);

        let mut conn = pool.acquire().await.unwrap();
        let entries = AuditLogs::new(&mut conn)
            .list(&AuditLogFilter {
                account_id: Some(account_id),
                action: Some("role.created".to_string()),
                ..AuditLogFilter::new(0, 10)
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].resource_id, Some(role.id.to_string()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_role_invalid_permission(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let manager = seed_member(&pool, account_id, "manager", vec!["roles:write".to_string()]).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&manager);
        let response = server
            .post(&format!("/accounts/{account_id}/roles"))
            .add_header(name, value)
            .json(&serde_json::json!({"name": "broken", "permissions": ["users:banana"]}))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_role_duplicate_name_conflicts(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let manager = seed_member(&pool, account_id, "manager", vec!["roles:write".to_string()]).await;
        seed_role(&pool, Some(account_id), "editor", false).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&manager);
        let response = server
            .post(&format!("/accounts/{account_id}/roles"))
            .add_header(name, value)
            .json(&serde_json::json!({"name": "editor", "permissions": []}))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_role_cross_account_forbidden(pool: PgPool) {
        let own = seed_account(&pool, "own").await;
        let other = seed_account(&pool, "other").await;
        let manager = seed_member(&pool, own, "manager", vec!["roles:write".to_string()]).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&manager);
        let response = server
            .post(&format!("/accounts/{other}/roles"))
            .add_header(name, value)
            .json(&serde_json::json!({"name": "intruder", "permissions": []}))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_roles_includes_platform_roles(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let other = seed_account(&pool, "other").await;
        let reader = seed_member(&pool, account_id, "reader", vec!["roles:read".to_string()]).await;
        seed_role(&pool, Some(account_id), "editor", false).await;
        seed_role(&pool, Some(other), "foreign", false).await;
        seed_role(&pool, None, "platform-auditor", true).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&reader);
        let response = server
            .get(&format!("/accounts/{account_id}/roles?limit=50"))
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        let body: PaginatedResponse<RoleResponse> = response.json();
        // reader-role + editor + the platform role, never the foreign one
        assert_eq!(body.total_count, 3);
        assert!(body.data.iter().any(|r| r.account_id.is_none()));
        assert!(!body.data.iter().any(|r| r.account_id == Some(other)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_role_scoping(pool: PgPool) {
        let own = seed_account(&pool, "own").await;
        let other = seed_account(&pool, "other").await;
        let reader = seed_member(&pool, own, "reader", vec!["roles:read".to_string()]).await;
        let own_role = seed_role(&pool, Some(own), "editor", false).await;
        let foreign_role = seed_role(&pool, Some(other), "foreign", false).await;
        let platform_role = seed_role(&pool, None, "platform-auditor", true).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&reader);
        let response = server.get(&format!("/roles/{own_role}")).add_header(name.clone(), value.clone()).await;
        response.assert_status_ok();

        let response = server
            .get(&format!("/roles/{platform_role}"))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();

        let response = server.get(&format!("/roles/{foreign_role}")).add_header(name, value).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_role(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let manager = seed_member(&pool, account_id, "manager", vec!["roles:write".to_string()]).await;
        let role_id = seed_role(&pool, Some(account_id), "editor", false).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&manager);
        let response = server
            .patch(&format!("/roles/{role_id}"))
            .add_header(name, value)
            .json(&serde_json::json!({"name": "publisher", "permissions": ["media:write", "webhooks:read"]}))
            .await;

        response.assert_status_ok();
        let role: RoleResponse = response.json();
        assert_eq!(role.name, "publisher");
        assert_eq!(role.permissions.len(), 2);

        let mut conn = pool.acquire().await.unwrap();
        let entries = AuditLogs::new(&mut conn)
            .list(&AuditLogFilter {
                account_id: Some(account_id),
                action: Some("role.updated".to_string()),
                ..AuditLogFilter::new(0, 10)
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_role_requires_write(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let reader = seed_member(&pool, account_id, "reader", vec!["roles:read".to_string()]).await;
        let role_id = seed_role(&pool, Some(account_id), "editor", false).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&reader);
        let response = server
            .patch(&format!("/roles/{role_id}"))
            .add_header(name, value)
            .json(&serde_json::json!({"name": "renamed"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_system_role_is_protected(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let manager = seed_member(&pool, account_id, "manager", vec!["roles:write".to_string()]).await;
        let role_id = seed_role(&pool, Some(account_id), "builtin", true).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&manager);
        let response = server
            .patch(&format!("/roles/{role_id}"))
            .add_header(name.clone(), value.clone())
            .json(&serde_json::json!({"name": "renamed"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = server.delete(&format!("/roles/{role_id}")).add_header(name, value).await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_role(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let manager = seed_member(&pool, account_id, "manager", vec!["roles:write".to_string()]).await;
        let role_id = seed_role(&pool, Some(account_id), "editor", false).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&manager);
        let response = server
            .delete(&format!("/roles/{role_id}"))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server.get(&format!("/roles/{role_id}")).add_header(name, value).await;
        response.assert_status(StatusCode::NOT_FOUND);

        let mut conn = pool.acquire().await.unwrap();
        let entries = AuditLogs::new(&mut conn)
            .list(&AuditLogFilter {
                account_id: Some(account_id),
                action: Some("role.deleted".to_string()),
                ..AuditLogFilter::new(0, 10)
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_platform_role_mutation_is_operator_only(pool: PgPool) {
        let operator = seed_operator(&pool).await;
        let account_id = seed_account(&pool, "acme").await;
        let manager = seed_member(&pool, account_id, "manager", vec!["roles:write".to_string()]).await;
        let role_id = seed_role(&pool, None, "support", false).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&manager);
        let response = server
            .patch(&format!("/roles/{role_id}"))
            .add_header(name, value)
            .json(&serde_json::json!({"description": "hijacked"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let (name, value) = bearer(&operator);
        let response = server
            .patch(&format!("/roles/{role_id}"))
            .add_header(name, value)
            .json(&serde_json::json!({"description": "front-line support"}))
            .await;
        response.assert_status_ok();
        let role: RoleResponse = response.json();
        assert_eq!(role.description, Some("front-line support".to_string()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_role_events_published(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let manager = seed_member(&pool, account_id, "manager", vec!["roles:write".to_string()]).await;

        let webhook_id = {
            let mut conn = pool.acquire().await.unwrap();
            Webhooks::new(&mut conn)
                .create(&WebhookCreateDBRequest {
                    account_id,
                    url: "https://example.com/hooks".to_string(),
                    secret: signing::generate_secret(),
                    events: vec!["role.created".to_string()],
                    description: None,
                })
                .await
                .unwrap()
                .id
        };

        let server = test_server(&pool);
        let (name, value) = bearer(&manager);
        server
            .post(&format!("/accounts/{account_id}/roles"))
            .add_header(name, value)
            .json(&serde_json::json!({"name": "editor", "permissions": ["media:write"]}))
            .await
            .assert_status(StatusCode::CREATED);

        let mut conn = pool.acquire().await.unwrap();
        let deliveries = Webhooks::new(&mut conn).list_deliveries(webhook_id, None, 0, 10).await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].event_type, "role.created");
    }
}
