//! Application error taxonomy and its HTTP mapping.
//!
//! Two levels: [`crate::db::errors::DbError`] classifies database failures,
//! and [`Error`] here maps everything onto the HTTP statuses the console's
//! interceptor understands (400/401/403/404/409/422/500/503). Response bodies
//! are always `{"error": "<user message>"}`; 401 responses deliberately carry
//! only a generic message so that credential probing learns nothing.

use crate::db::errors::DbError;
use crate::types::{Operation, Resource};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided or invalid
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Requester lacks the required permission for the operation
    #[error("Insufficient permissions to {action} {resource}")]
    PermissionDenied { action: Operation, resource: Resource },

    /// Authenticated but blocked outright, e.g. a suspended user or account
    #[error("{message}")]
    Forbidden { message: String },

    /// Malformed request data (bad identifiers, unreadable bodies, missing parts)
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Well-formed request that violates a semantic rule (invalid slug, unknown
    /// permission string, unsupported content type, dangling reference)
    #[error("{message}")]
    Validation { message: String },

    /// Conflict with existing state, e.g. duplicate names or replayed operations
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// A dependency (the database) is unreachable
    #[error("Service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Wire shape of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message, safe to surface in the console
    pub error: String,
    /// Resource kind for conflict responses, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::PermissionDenied { .. } | Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DbError::CheckViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DbError::ProtectedEntity { .. } => StatusCode::FORBIDDEN,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details.
    ///
    /// 401 always maps to the same generic text regardless of what failed inside
    /// authentication; the console suppresses its error toast for 401 and any
    /// detail here would only help credential probing.
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { .. } => "Authentication required".to_string(),
            Error::PermissionDenied { action, resource } => {
                format!("Insufficient permissions to {action} {resource}")
            }
            Error::Forbidden { message } => message.clone(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Validation { message } => message.clone(),
            Error::Conflict { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::ServiceUnavailable { .. } => "Service temporarily unavailable".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => unique_violation_message(table.as_deref(), constraint.as_deref()).0,
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::ProtectedEntity {
                    operation,
                    entity_type,
                    reason,
                    ..
                } => {
                    format!("Cannot {operation} {entity_type}: {reason}")
                }
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

/// User-friendly message and resource kind for common unique constraint violations
fn unique_violation_message(table: Option<&str>, constraint: Option<&str>) -> (String, &'static str) {
    match (table, constraint) {
        (Some("users"), Some(c)) if c.contains("email") => ("A user with this email address already exists".to_string(), "user"),
        (Some("users"), Some(c)) if c.contains("username") => ("This username is already taken".to_string(), "user"),
        (Some("accounts"), Some(c)) if c.contains("slug") => {
            ("An account with this slug already exists. Please choose a different slug.".to_string(), "account")
        }
        (Some("roles"), _) => ("A role with this name already exists in the account".to_string(), "role"),
        (Some("user_roles"), _) => ("This role is already assigned to the user".to_string(), "role"),
        _ => ("Resource already exists".to_string(), "unknown"),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::ServiceUnavailable { .. } => {
                tracing::error!("Dependency unavailable: {}", self);
            }
            Error::Database(_) | Error::Conflict { .. } => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::PermissionDenied { .. } | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::Validation { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        let body = match &self {
            // Unique violations carry the resource kind so the console can
            // highlight the offending form field
            Error::Database(DbError::UniqueViolation { constraint, table, .. }) => {
                let (message, resource) = unique_violation_message(table.as_deref(), constraint.as_deref());
                ErrorBody {
                    error: message,
                    resource: Some(resource.to_string()),
                }
            }
            _ => ErrorBody {
                error: self.user_message(),
                resource: None,
            },
        };

        (status, axum::response::Json(body)).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
