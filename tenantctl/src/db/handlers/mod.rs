//! Repository implementations for database access.
//!
//! This module provides repository structs for each major entity in the system.
//! Repositories follow a consistent pattern and implement the [`Repository`] trait.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//! - Uses the connection's transaction for ACID guarantees
//!
//! # Available Repositories
//!
//! - [`Accounts`]: Tenant account lifecycle, including suspension and closure
//! - [`Users`]: User management and authentication lookups
//! - [`Roles`]: Role definitions and user role assignments
//! - [`ApiKeys`]: API key management and secret lookups
//! - [`ApiRequests`]: Per-request API usage records
//! - [`AuditLogs`] / [`AuditExports`]: Audit trail and export jobs
//! - [`Media`]: Uploaded file metadata and content
//! - [`Webhooks`]: Webhook configuration and delivery tracking
//!
//! # Common Pattern
//!
//! All repositories follow this usage pattern:
//!
//! ```ignore
//! use tenantctl::db::handlers::{Repository, Users};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     // Start a transaction
//!     let mut tx = pool.begin().await?;
//!
//!     // Create repository from transaction
//!     let mut repo = Users::new(&mut tx);
//!
//!     // Perform operations
//!     let user = repo.get_user_by_email("admin@localhost").await?;
//!
//!     // Commit or rollback
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod api_keys;
pub mod audit;
pub mod media;
pub mod repository;
pub mod requests;
pub mod roles;
pub mod users;
pub mod webhooks;

pub use accounts::Accounts;
pub use api_keys::ApiKeys;
pub use audit::{AuditExports, AuditLogs};
pub use media::Media;
pub use repository::Repository;
pub use requests::ApiRequests;
pub use roles::Roles;
pub use users::Users;
pub use webhooks::Webhooks;
