//! API request and response data models.
//!
//! This module contains the data structures used for HTTP request deserialization
//! and response serialization. These models define the public API contract.
//!
//! # Design Principles
//!
//! - **Separation of Concerns**: API models are distinct from database models,
//!   allowing independent evolution of API and storage representations
//! - **Validation**: Models use serde for deserialization and validation
//! - **OpenAPI**: All models are annotated with `utoipa` for automatic API docs
//! - **Type Safety**: Strong typing with newtype wrappers for IDs
//!
//! # Model Categories
//!
//! ## Resource Models
//!
//! - [`accounts`]: Tenant accounts and lifecycle requests
//! - [`users`]: User profiles and creation/update requests
//! - [`roles`]: Role definitions and permission grants
//! - [`api_keys`]: API key metadata (full secrets appear only on create)
//! - [`media`]: Stored media metadata
//! - [`webhooks`]: Webhook endpoints and delivery records
//!
//! ## Operational Models
//!
//! - [`requests`]: Per-key request usage records
//! - [`audit`]: Audit trail entries and exports
//!
//! ## Authentication Models
//!
//! - [`auth`]: Login payloads
//!
//! # Example
//!
//! ```ignore
//! use tenantctl::api::models::users::{UserCreate, UserResponse};
//!
//! // Deserialize from JSON
//! let create_req: UserCreate = serde_json::from_str(json_str)?;
//!
//! // Serialize to JSON
//! let response = UserResponse { /* ... */ };
//! let json = serde_json::to_string(&response)?;
//! ```

pub mod accounts;
pub mod api_keys;
pub mod audit;
pub mod auth;
pub mod media;
pub mod pagination;
pub mod requests;
pub mod roles;
pub mod users;
pub mod webhooks;
