//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and authorization checks
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`accounts`]: Tenant account CRUD, suspension, and reactivation
//! - [`api_keys`]: API key issuance, listing, revocation, and request logs
//! - [`audit`]: Audit log listing and synchronous export download
//! - [`auth`]: Login, logout, and current-user introspection
//! - [`media`]: Multipart file upload, metadata, download, and deletion
//! - [`roles`]: Role CRUD and permission string management
//! - [`static_assets`]: Frontend asset serving and SPA routing
//! - [`users`]: User CRUD, profile updates, and role assignments
//! - [`webhooks`]: Webhook endpoint CRUD, secret rotation, and delivery history
//!
//! # Authentication
//!
//! Most handlers require authentication via session cookies or API keys.
//! The [`crate::auth`] module provides the [`CurrentUser`] extractor that
//! handlers take as an argument to access the authenticated principal.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and JSON error responses.
//!
//! [`CurrentUser`]: crate::api::models::users::CurrentUser

pub mod accounts;
pub mod api_keys;
pub mod audit;
pub mod auth;
pub mod media;
pub mod roles;
pub mod static_assets;
pub mod users;
pub mod webhooks;
