//! Persistence layer: SQLx over PostgreSQL, one repository per aggregate.
//!
//! Split into three parts:
//!
//! - [`handlers`]: repositories owning all SQL for one table (plus its
//!   satellite tables), constructed over a `&mut PgConnection`
//! - [`models`]: row structs and the `*DBRequest`/`*DBResponse` types
//!   repositories accept and return
//! - [`errors`]: [`errors::DbError`], classified from `sqlx::Error` so
//!   handlers can map constraint violations to meaningful HTTP statuses
//!
//! Repositories take whatever connection the caller hands them, so a
//! handler that needs a mutation, its audit row, and its webhook outbox
//! entry to commit or roll back together just builds all three
//! repositories over the same transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let user = Users::new(&mut tx).create(&request).await?;
//! AuditLogs::new(&mut tx).record(&entry).await?;
//! tx.commit().await?;
//! ```
//!
//! Single reads skip the transaction and borrow a pool connection
//! directly. Schema migrations live in `migrations/` and are embedded via
//! [`crate::migrator`], which startup (and `#[sqlx::test]`) runs before
//! serving.

pub mod errors;
pub mod handlers;
pub mod models;
