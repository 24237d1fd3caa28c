//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! The API is divided into several functional areas:
//!
//! - **Authentication** (`/authentication/*`): Login, logout, current user
//! - **Accounts** (`/admin/api/v1/accounts/*`): Tenant account lifecycle
//! - **Users** (`/admin/api/v1/users/*`, `/admin/api/v1/accounts/{id}/users`): User
//!   management and role assignments
//! - **Roles** (`/admin/api/v1/roles/*`, `/admin/api/v1/accounts/{id}/roles`): Role
//!   definitions and permissions
//! - **API Keys** (`/admin/api/v1/users/{id}/api-keys/*`): Programmatic credentials
//!   and their per-request usage log
//! - **Audit** (`/admin/api/v1/accounts/{id}/audit-logs`, `.../audit-exports`):
//!   Audit trail queries and synchronous exports
//! - **Media** (`/admin/api/v1/media/*`, `/admin/api/v1/accounts/{id}/media`):
//!   Uploaded files
//! - **Webhooks** (`/admin/api/v1/webhooks/*`, `/admin/api/v1/accounts/{id}/webhooks`):
//!   Webhook configuration and delivery history
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/admin/docs` when the server is running.

pub mod handlers;
pub mod models;
