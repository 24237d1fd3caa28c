use crate::api::models::pagination::PaginatedResponse;
use crate::{
    api::models::{
        audit::{AuditExportCreate, AuditExportResponse, AuditLogResponse, ListAuditExportsQuery, ListAuditLogsQuery},
        users::CurrentUser,
    },
    auth::permissions,
    db::handlers::{
        audit::{AuditExportFilter, AuditLogFilter},
        Accounts, AuditExports, AuditLogs, Repository,
    },
    db::models::audit::{AuditExportCreateDBRequest, AuditExportDBResponse, AuditLogCreateDBRequest, AuditLogDBResponse},
    errors::{Error, Result},
    types::{AccountId, AuditExportId, Operation, Resource},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};

/// Fetch an export, hiding other accounts' exports from non-admins.
/// Platform-scoped exports (no account) are visible to operators only.
async fn fetch_scoped_export(
    db: &mut sqlx::PgConnection,
    current_user: &CurrentUser,
    export_id: AuditExportId,
) -> Result<AuditExportDBResponse> {
    let not_found = || Error::NotFound {
        resource: "Audit export".to_string(),
        id: export_id.to_string(),
    };

    let export = AuditExports::new(db).get_by_id(export_id).await?.ok_or_else(not_found)?;
    if !current_user.is_admin && export.account_id != Some(current_user.account_id) {
        return Err(not_found());
    }
    Ok(export)
}

fn csv_escape(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render audit entries as CSV, one line per entry, header first.
fn render_csv(rows: &[AuditLogDBResponse]) -> String {
    let mut out = String::from("id,account_id,actor_id,actor_email,action,resource_type,resource_id,details,created_at\n");
    for row in rows {
        let fields = [
            row.id.to_string(),
            row.account_id.map(|id| id.to_string()).unwrap_or_default(),
            row.actor_id.map(|id| id.to_string()).unwrap_or_default(),
            row.actor_email.clone().unwrap_or_default(),
            row.action.clone(),
            row.resource_type.clone(),
            row.resource_id.clone().unwrap_or_default(),
            row.details.to_string(),
            row.created_at.to_rfc3339(),
        ];
        let line: Vec<String> = fields.iter().map(|field| csv_escape(field)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// List an account's audit trail, newest first.
#[utoipa::path(
    get,
    path = "/accounts/{account_id}/audit-logs",
    tag = "audit",
    summary = "List audit logs",
    description = "List an account's audit trail, newest entries first",
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID"),
        ListAuditLogsQuery
    ),
    responses(
        (status = 200, description = "Paginated audit trail", body = PaginatedResponse<AuditLogResponse>),
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
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<ListAuditLogsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<AuditLogResponse>>> {
    permissions::require_same_account(&current_user, account_id, Resource::AuditLogs, Operation::Read)?;
    permissions::require(&current_user, Resource::AuditLogs, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut pool_conn)
        .get_by_id(account_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })?;

    let (skip, limit) = query.pagination.params();
    let filter = AuditLogFilter {
        account_id: Some(account_id),
        actor_id: query.actor_id,
        action: query.action,
        resource_type: query.resource_type,
        from: query.from,
        to: query.to,
        skip,
        limit,
    };

    let mut repo = AuditLogs::new(&mut pool_conn);
    let entries = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = entries.into_iter().map(AuditLogResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Create a synchronous audit export for an account.
///
/// The filter is stored with the export and the matching row count is
/// computed immediately; the download re-runs the stored filter.
#[utoipa::path(
    post,
    path = "/accounts/{account_id}/audit-exports",
    tag = "audit",
    summary = "Create audit export",
    description = "Snapshot an audit log filter into a downloadable export",
    request_body = AuditExportCreate,
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 201, description = "Export created", body = AuditExportResponse),
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
pub async fn create_audit_export(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
    Json(create): Json<AuditExportCreate>,
) -> Result<(StatusCode, Json<AuditExportResponse>)> {
    permissions::require_same_account(&current_user, account_id, Resource::AuditExports, Operation::Create)?;
    permissions::require(&current_user, Resource::AuditExports, Operation::Create)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut tx).get_by_id(account_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Account".to_string(),
        id: account_id.to_string(),
    })?;

    let export = AuditExports::new(&mut tx)
        .create(&AuditExportCreateDBRequest {
            requested_by: current_user.id,
            account_id: Some(account_id),
            format: create.format,
            from_time: create.from,
            to_time: create.to,
            action: create.action,
            resource_type: create.resource_type,
        })
        .await?;

    // Exporting the trail is itself part of the trail
    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: "audit_export.created".to_string(),
            resource_type: "audit_export".to_string(),
            resource_id: Some(export.id.to_string()),
            details: serde_json::json!({"format": export.format, "row_count": export.row_count}),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(AuditExportResponse::from(export))))
}

/// List an account's audit exports, newest first.
#[utoipa::path(
    get,
    path = "/accounts/{account_id}/audit-exports",
    tag = "audit",
    summary = "List audit exports",
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID"),
        ListAuditExportsQuery
    ),
    responses(
        (status = 200, description = "Paginated list of exports", body = PaginatedResponse<AuditExportResponse>),
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
pub async fn list_audit_exports(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<ListAuditExportsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<AuditExportResponse>>> {
    permissions::require_same_account(&current_user, account_id, Resource::AuditExports, Operation::Read)?;
    permissions::require(&current_user, Resource::AuditExports, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut pool_conn)
        .get_by_id(account_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })?;

    let (skip, limit) = query.pagination.params();
    let mut filter = AuditExportFilter::new(skip, limit);
    filter.account_id = Some(account_id);

    let mut repo = AuditExports::new(&mut pool_conn);
    let exports = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = exports.into_iter().map(AuditExportResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Get a specific audit export.
#[utoipa::path(
    get,
    path = "/audit-exports/{id}",
    tag = "audit",
    summary = "Get audit export",
    params(
        ("id" = uuid::Uuid, Path, description = "Audit export ID")
    ),
    responses(
        (status = 200, description = "Export metadata", body = AuditExportResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Audit export not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_audit_export(
    State(state): State<AppState>,
    Path(export_id): Path<AuditExportId>,
    current_user: CurrentUser,
) -> Result<Json<AuditExportResponse>> {
    permissions::require(&current_user, Resource::AuditExports, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let export = fetch_scoped_export(&mut pool_conn, &current_user, export_id).await?;

    Ok(Json(AuditExportResponse::from(export)))
}

/// Download an export's content in its stored format.
#[utoipa::path(
    get,
    path = "/audit-exports/{id}/download",
    tag = "audit",
    summary = "Download audit export",
    description = "Download the entries matching the export's stored filter, as CSV or JSON",
    params(
        ("id" = uuid::Uuid, Path, description = "Audit export ID")
    ),
    responses(
        (status = 200, description = "Export content", content_type = "text/csv"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Audit export not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn download_audit_export(
    State(state): State<AppState>,
    Path(export_id): Path<AuditExportId>,
    current_user: CurrentUser,
) -> Result<Response> {
    permissions::require(&current_user, Resource::AuditExports, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let export = fetch_scoped_export(&mut pool_conn, &current_user, export_id).await?;

    let rows = AuditLogs::new(&mut pool_conn).export_rows(&export).await?;

    let body = match export.format {
        crate::api::models::audit::ExportFormat::Csv => render_csv(&rows).into_bytes(),
        crate::api::models::audit::ExportFormat::Json => {
            let entries: Vec<AuditLogResponse> = rows.into_iter().map(AuditLogResponse::from).collect();
            serde_json::to_vec(&entries).map_err(anyhow::Error::from)?
        }
    };

    let headers = [
        (header::CONTENT_TYPE, export.format.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"audit-export-{}.{}\"", export.id, export.format.file_extension()),
        ),
    ];

    Ok((headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::audit::ExportFormat,
        api::models::users::UserStatus,
        db::{
            handlers::{ApiKeys, Roles, Users},
            models::{
                accounts::AccountCreateDBRequest,
                api_keys::ApiKeyCreateDBRequest,
                roles::RoleCreateDBRequest,
                users::UserCreateDBRequest,
            },
        },
        test_utils::create_test_config,
        types::UserId,
    };
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::PgPool;

    fn test_server(pool: &PgPool) -> TestServer {
        let state = AppState::builder().db(pool.clone()).config(create_test_config()).build();

        let app = axum::Router::new()
            .route("/accounts/{account_id}/audit-logs", axum::routing::get(list_audit_logs))
            .route(
                "/accounts/{account_id}/audit-exports",
                axum::routing::post(create_audit_export).get(list_audit_exports),
            )
            .route("/audit-exports/{id}", axum::routing::get(get_audit_export))
            .route("/audit-exports/{id}/download", axum::routing::get(download_audit_export))
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

    async fn seed_member(pool: &PgPool, account_id: AccountId, username: &str, permissions: Vec<String>) -> (UserId, String) {
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
        let secret = seed_api_key(pool, user_id).await;
        (user_id, secret)
    }

    async fn seed_operator(pool: &PgPool) -> String {
        let platform = seed_account(pool, "platform").await;
        let root_id = seed_user(pool, platform, "root", true).await;
        seed_api_key(pool, root_id).await
    }

    fn bearer(secret: &str) -> (String, String) {
        ("authorization".to_string(), format!("Bearer {secret}"))
    }

    async fn record_entry(pool: &PgPool, account_id: AccountId, action: &str, resource_type: &str) {
        let mut conn = pool.acquire().await.unwrap();
        AuditLogs::new(&mut conn)
            .record(&AuditLogCreateDBRequest {
                account_id: Some(account_id),
                actor_id: None,
                actor_email: Some("seed@example.com".to_string()),
                action: action.to_string(),
                resource_type: resource_type.to_string(),
                resource_id: None,
                details: json!({}),
            })
            .await
            .unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_audit_logs_with_filters(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let (_, auditor) = seed_member(&pool, account_id, "auditor", vec!["audit_logs:read".to_string()]).await;

        record_entry(&pool, account_id, "user.created", "user").await;
        record_entry(&pool, account_id, "user.deleted", "user").await;
        record_entry(&pool, account_id, "role.created", "role").await;

        let server = test_server(&pool);
        let (name, value) = bearer(&auditor);

        let response = server
            .get(&format!("/accounts/{account_id}/audit-logs"))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body: PaginatedResponse<AuditLogResponse> = response.json();
        assert_eq!(body.total_count, 3);

        let response = server
            .get(&format!("/accounts/{account_id}/audit-logs?action=user.created"))
            .add_header(name.clone(), value.clone())
            .await;
        let body: PaginatedResponse<AuditLogResponse> = response.json();
        assert_eq!(body.total_count, 1);
        assert_eq!(body.data[0].action, "user.created");

        let response = server
            .get(&format!("/accounts/{account_id}/audit-logs?resource_type=role"))
            .add_header(name, value)
            .await;
        let body: PaginatedResponse<AuditLogResponse> = response.json();
        assert_eq!(body.total_count, 1);
        assert_eq!(body.data[0].resource_type, "role");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_audit_logs_require_permission(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let (_, plain) = seed_member(&pool, account_id, "plain", vec![]).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&plain);
        let response = server.get(&format!("/accounts/{account_id}/audit-logs")).add_header(name, value).await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_audit_logs_cross_account_forbidden(pool: PgPool) {
        let own = seed_account(&pool, "own").await;
        let other = seed_account(&pool, "other").await;
        let (_, auditor) = seed_member(&pool, own, "auditor", vec!["audit_logs:read".to_string()]).await;
        let operator = seed_operator(&pool).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&auditor);
        let response = server.get(&format!("/accounts/{other}/audit-logs")).add_header(name, value).await;
        response.assert_status(StatusCode::FORBIDDEN);

        let (name, value) = bearer(&operator);
        let response = server.get(&format!("/accounts/{other}/audit-logs")).add_header(name, value).await;
        response.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_export_snapshots_count(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let elsewhere = seed_account(&pool, "elsewhere").await;
        let (_, exporter) = seed_member(&pool, account_id, "exporter", vec!["audit_exports:write".to_string()]).await;

        record_entry(&pool, account_id, "user.created", "user").await;
        record_entry(&pool, account_id, "user.updated", "user").await;
        record_entry(&pool, elsewhere, "user.created", "user").await;

        let server = test_server(&pool);
        let (name, value) = bearer(&exporter);

        let response = server
            .post(&format!("/accounts/{account_id}/audit-exports"))
            .add_header(name.clone(), value.clone())
            .json(&json!({"format": "csv"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let export: AuditExportResponse = response.json();
        // Only this account's entries count; the other account's do not
        assert_eq!(export.row_count, 2);
        assert_eq!(export.format, ExportFormat::Csv);

        let response = server
            .get(&format!("/audit-exports/{}", export.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let fetched: AuditExportResponse = response.json();
        assert_eq!(fetched.row_count, 2);

        // The export itself left a trail entry
        let response = server
            .get(&format!("/accounts/{account_id}/audit-logs?action=audit_export.created"))
            .add_header(name, value)
            .await;
        let body: PaginatedResponse<AuditLogResponse> = response.json();
        assert_eq!(body.total_count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_export_download_csv(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let (_, exporter) = seed_member(&pool, account_id, "exporter", vec!["audit_exports:write".to_string()]).await;

        record_entry(&pool, account_id, "user.created", "user").await;
        record_entry(&pool, account_id, "role.created", "role").await;

        let server = test_server(&pool);
        let (name, value) = bearer(&exporter);

        let export: AuditExportResponse = server
            .post(&format!("/accounts/{account_id}/audit-exports"))
            .add_header(name.clone(), value.clone())
            .json(&json!({"format": "csv"}))
            .await
            .json();

        let response = server
            .get(&format!("/audit-exports/{}/download", export.id))
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.headers().get("content-type").map(|v| v.to_str().unwrap()),
            Some("text/csv")
        );
        let disposition = response.headers().get("content-disposition").unwrap().to_str().unwrap();
        assert!(disposition.contains(&format!("audit-export-{}.csv", export.id)));

        let text = response.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,account_id,actor_id"));
        // Oldest first in the export body
        assert!(lines[1].contains("user.created"));
        assert!(lines[2].contains("role.created"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_export_download_json(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let (_, exporter) = seed_member(&pool, account_id, "exporter", vec!["audit_exports:write".to_string()]).await;

        record_entry(&pool, account_id, "user.created", "user").await;

        let server = test_server(&pool);
        let (name, value) = bearer(&exporter);

        let export: AuditExportResponse = server
            .post(&format!("/accounts/{account_id}/audit-exports"))
            .add_header(name.clone(), value.clone())
            .json(&json!({"format": "json"}))
            .await
            .json();

        let response = server
            .get(&format!("/audit-exports/{}/download", export.id))
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.headers().get("content-type").map(|v| v.to_str().unwrap()),
            Some("application/json")
        );
        let entries: Vec<AuditLogResponse> = serde_json::from_str(&response.text()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "user.created");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_exports_are_account_scoped(pool: PgPool) {
        let own = seed_account(&pool, "own").await;
        let other = seed_account(&pool, "other").await;
        let (_, exporter) = seed_member(&pool, own, "exporter", vec!["audit_exports:write".to_string()]).await;
        let (_, outsider) = seed_member(&pool, other, "outsider", vec!["audit_exports:write".to_string()]).await;
        let operator = seed_operator(&pool).await;

        let server = test_server(&pool);
        let (name, value) = bearer(&exporter);

        let export: AuditExportResponse = server
            .post(&format!("/accounts/{own}/audit-exports"))
            .add_header(name.clone(), value.clone())
            .json(&json!({"format": "csv"}))
            .await
            .json();

        let response = server.get(&format!("/accounts/{own}/audit-exports")).add_header(name, value).await;
        response.assert_status_ok();
        let body: PaginatedResponse<AuditExportResponse> = response.json();
        assert_eq!(body.total_count, 1);

        // Another account's member cannot see it, by listing or by id
        let (name, value) = bearer(&outsider);
        let response = server
            .get(&format!("/audit-exports/{}", export.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        let response = server
            .get(&format!("/audit-exports/{}/download", export.id))
            .add_header(name, value)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let (name, value) = bearer(&operator);
        let response = server.get(&format!("/audit-exports/{}", export.id)).add_header(name, value).await;
        response.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_exports_require_permission(pool: PgPool) {
        let account_id = seed_account(&pool, "acme").await;
        let (_, plain) = seed_member(&pool, account_id, "plain", vec![]).await;
        let server = test_server(&pool);

        let (name, value) = bearer(&plain);
        let response = server
            .post(&format!("/accounts/{account_id}/audit-exports"))
            .add_header(name.clone(), value.clone())
            .json(&json!({"format": "csv"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = server
            .get(&format!("/accounts/{account_id}/audit-exports"))
            .add_header(name, value)
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("with,comma"), "\"with,comma\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("line\nbreak"), "\"line\nbreak\"");
    }
}
