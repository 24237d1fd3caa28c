//! OpenAPI documentation for the admin API.
//!
//! The generated document is served as JSON at `/api-docs/openapi.json` and
//! rendered by the Scalar console at `/admin/docs`. Admin endpoints are nested
//! under `/admin/api/v1`; the authentication endpoints live at the root.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, db, errors};

/// Registers the two supported authentication schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "session_token".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "tenantctl_session",
                    "Session cookie issued by `POST /authentication/login`.",
                ))),
            );
            components.security_schemes.insert(
                "api_key".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("API Key")
                        .description(Some(
                            "API key authentication. Include your key in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer ak-YOUR_KEY\n```\n\n\
                            Keys are created per user via the API keys endpoints.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Endpoints mounted under `/admin/api/v1`.
#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::accounts::create_account,
        api::handlers::accounts::list_accounts,
        api::handlers::accounts::get_account,
        api::handlers::accounts::update_account,
        api::handlers::accounts::suspend_account,
        api::handlers::accounts::reactivate_account,
        api::handlers::accounts::delete_account,
        api::handlers::users::create_user,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::users::list_user_roles,
        api::handlers::users::assign_role,
        api::handlers::users::remove_role,
        api::handlers::roles::create_role,
        api::handlers::roles::list_roles,
        api::handlers::roles::get_role,
        api::handlers::roles::update_role,
        api::handlers::roles::delete_role,
        api::handlers::api_keys::create_user_api_key,
        api::handlers::api_keys::list_user_api_keys,
        api::handlers::api_keys::get_user_api_key,
        api::handlers::api_keys::delete_user_api_key,
        api::handlers::api_keys::list_api_key_requests,
        api::handlers::audit::list_audit_logs,
        api::handlers::audit::create_audit_export,
        api::handlers::audit::list_audit_exports,
        api::handlers::audit::get_audit_export,
        api::handlers::audit::download_audit_export,
        api::handlers::media::upload_media,
        api::handlers::media::list_media,
        api::handlers::media::get_media,
        api::handlers::media::download_media,
        api::handlers::media::delete_media,
        api::handlers::webhooks::create_webhook,
        api::handlers::webhooks::list_webhooks,
        api::handlers::webhooks::get_webhook,
        api::handlers::webhooks::update_webhook,
        api::handlers::webhooks::delete_webhook,
        api::handlers::webhooks::rotate_webhook_secret,
        api::handlers::webhooks::list_webhook_deliveries,
    ),
    components(
        schemas(
            api::models::accounts::AccountCreate,
            api::models::accounts::AccountUpdate,
            api::models::accounts::AccountResponse,
            api::models::accounts::AccountStatus,
            api::models::users::UserCreate,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            api::models::users::UserStatus,
            api::models::roles::RoleCreate,
            api::models::roles::RoleUpdate,
            api::models::roles::RoleResponse,
            api::models::roles::RoleRef,
            api::models::api_keys::ApiKeyCreate,
            api::models::api_keys::ApiKeyResponse,
            api::models::api_keys::ApiKeyInfoResponse,
            api::models::api_keys::ApiKeyStatus,
            api::models::requests::ApiRequestResponse,
            api::models::audit::AuditLogResponse,
            api::models::audit::AuditExportCreate,
            api::models::audit::AuditExportResponse,
            api::models::audit::ExportFormat,
            api::models::media::MediaResponse,
            api::models::webhooks::WebhookCreate,
            api::models::webhooks::WebhookUpdate,
            api::models::webhooks::WebhookResponse,
            api::models::webhooks::WebhookWithSecretResponse,
            api::models::webhooks::DeliveryResponse,
            db::models::webhooks::DeliveryStatus,
            api::models::pagination::PaginatedResponse<api::models::accounts::AccountResponse>,
            api::models::pagination::PaginatedResponse<api::models::users::UserResponse>,
            api::models::pagination::PaginatedResponse<api::models::roles::RoleResponse>,
            api::models::pagination::PaginatedResponse<api::models::api_keys::ApiKeyInfoResponse>,
            api::models::pagination::PaginatedResponse<api::models::requests::ApiRequestResponse>,
            api::models::pagination::PaginatedResponse<api::models::audit::AuditLogResponse>,
            api::models::pagination::PaginatedResponse<api::models::audit::AuditExportResponse>,
            api::models::pagination::PaginatedResponse<api::models::media::MediaResponse>,
            api::models::pagination::PaginatedResponse<api::models::webhooks::DeliveryResponse>,
            errors::ErrorBody,
        )
    ),
    tags(
        (name = "accounts", description = "Tenant account lifecycle: creation, plan and contact updates, suspension, reactivation and closure. Restricted to platform operators."),
        (name = "users", description = "Users within an account, their lifecycle state and role assignments."),
        (name = "roles", description = "Role definitions and the permissions they grant. Platform-wide roles are managed by operators; account roles by account admins."),
        (name = "api_keys", description = "Per-user API keys for programmatic access, plus the usage log recorded for each key."),
        (name = "audit", description = "Audit trail queries and synchronous exports in JSON or CSV."),
        (name = "media", description = "Files uploaded to an account: metadata, content download and soft deletion."),
        (name = "webhooks", description = "Webhook endpoints, secret rotation and delivery history."),
    )
)]
struct AdminApi;

/// The complete API document: authentication at the root plus the nested
/// admin surface.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::get_current_user,
    ),
    nest(
        (path = "/admin/api/v1", api = AdminApi)
    ),
    components(
        schemas(
            api::models::auth::LoginRequest,
            api::models::auth::AuthResponse,
            api::models::auth::AuthSuccessResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Session login and logout. A successful login sets an HttpOnly session cookie; `GET /authentication/me` returns the caller's identity."),
    ),
    info(
        title = "tenantctl Admin API",
        version = "1.0.0",
        description = "Management API for tenant accounts, users, roles, API keys, audit logs, media and webhooks.

## Authentication

Browser sessions authenticate with the session cookie set by `POST /authentication/login`.
Programmatic clients pass an API key in the `Authorization` header:

```
Authorization: Bearer ak-YOUR_KEY
```

## Errors

Errors are returned as JSON with a human-readable `error` message. Conflict
responses additionally name the `resource` kind that collided:

```json
{
  \"error\": \"an account with this identifier already exists\",
  \"resource\": \"account\"
}
```",
    ),
)]
pub struct ApiDoc;
