//! Database models for the audit trail and audit exports.

use crate::api::models::audit::ExportFormat;
use crate::types::{AccountId, AuditExportId, AuditLogId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for appending an audit log entry
#[derive(Debug, Clone)]
pub struct AuditLogCreateDBRequest {
    /// Account the affected resource belongs to. None for platform-level
    /// actions that touch no account.
    pub account_id: Option<AccountId>,
    pub actor_id: Option<UserId>,
    /// Denormalized so entries survive actor deletion
    pub actor_email: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
}

/// Database response for an audit log entry
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogDBResponse {
    pub id: AuditLogId,
    pub account_id: Option<AccountId>,
    pub actor_id: Option<UserId>,
    pub actor_email: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Database request for creating an audit export. The filter fields are stored
/// with the export so downloads re-run the exact same query.
#[derive(Debug, Clone)]
pub struct AuditExportCreateDBRequest {
    pub requested_by: UserId,
    pub account_id: Option<AccountId>,
    pub format: ExportFormat,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
}

/// Database response for an audit export
#[derive(Debug, Clone, FromRow)]
pub struct AuditExportDBResponse {
    pub id: AuditExportId,
    pub requested_by: UserId,
    pub account_id: Option<AccountId>,
    pub format: ExportFormat,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub row_count: i64,
    pub created_at: DateTime<Utc>,
}
