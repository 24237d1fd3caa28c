//! Database record models matching table schemas.
//!
//! This module contains struct definitions that directly correspond to database
//! table rows. These models are used by repositories to return query results
//! and accept insertion/update data.
//!
//! # Design Principles
//!
//! - **Schema Mapping**: Each model struct matches a database table schema
//! - **SQLx Integration**: Models derive `sqlx::FromRow` for query results
//! - **Separation**: Database models are distinct from API models to allow
//!   independent evolution of storage and API representations
//! - **Type Safety**: Uses ID aliases (UserId, AccountId, etc.) from [`crate::types`]
//!
//! # Model Categories
//!
//! ## Core Resources
//!
//! - [`accounts`]: Tenant accounts and lifecycle state
//! - [`users`]: Users scoped to an account, with role assignments
//! - [`roles`]: Named permission bundles, per-account or platform-wide
//!
//! ## Access Control
//!
//! - [`api_keys`]: API keys for programmatic access
//!
//! ## Operations
//!
//! - [`requests`]: Per-request API usage records
//! - [`audit`]: Audit log entries and export jobs
//! - [`media`]: Uploaded file metadata and content
//! - [`webhooks`]: Webhook endpoints and delivery tracking
//!
//! # Conversion to API Models
//!
//! Database models typically implement `From` or `Into` conversions to API models:
//!
//! ```ignore
//! use tenantctl::db::models::users::UserDBResponse;
//! use tenantctl::api::models::users::UserResponse;
//!
//! let db_user: UserDBResponse = /* ... */;
//! let api_response: UserResponse = db_user.into();
//! ```

pub mod accounts;
pub mod api_keys;
pub mod audit;
pub mod media;
pub mod requests;
pub mod roles;
pub mod users;
pub mod webhooks;
