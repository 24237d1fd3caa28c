//! Authentication and authorization system.
//!
//! # Authentication Methods
//!
//! The system supports two authentication methods:
//!
//! ## 1. Session Authentication
//!
//! Browser-based authentication using secure HTTP-only cookies:
//! - Users log in via `/authentication/login` with email/password
//! - A JWT session token is stored in an HTTP-only cookie
//! - The token only identifies the user; roles and status are re-read from
//!   the database on every request
//!
//! ## 2. API Key Authentication
//!
//! Token-based authentication for programmatic access:
//! - API keys created per-user via `/users/{id}/api-keys`
//! - Passed in `Authorization: Bearer ak-...` header
//! - Optional expiry; revocable at any time
//!
//! # Authorization
//!
//! Access control is role-based: roles carry `{resource}:{access}` permission
//! strings, aggregated onto the [`api::models::users::CurrentUser`] extractor
//! at request time. Platform operators (`is_admin`) bypass permission checks
//! and may act across accounts; everyone else is confined to their own
//! account. See [`permissions`].
//!
//! # Modules
//!
//! - [`current_user`]: The extractor that authenticates requests
//! - [`password`]: Password hashing and verification using Argon2
//! - [`permissions`]: Permission checking and access control logic
//! - [`session`]: JWT session token creation and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use tenantctl::api::models::users::CurrentUser;
//! use tenantctl::auth::permissions;
//! use tenantctl::types::{Operation, Resource};
//!
//! async fn protected_handler(current_user: CurrentUser) -> Result<String> {
//!     permissions::require(&current_user, Resource::Users, Operation::Read)?;
//!     Ok(format!("Hello, {}!", current_user.username))
//! }
//! ```
//!
//! [`api::models::users::CurrentUser`]: crate::api::models::users::CurrentUser

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
