//! API request/response models for audit logs and exports.

use super::pagination::Pagination;
use crate::db::models::audit::{AuditExportDBResponse, AuditLogDBResponse};
use crate::types::{AccountId, AuditExportId, AuditLogId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Serialization format for audit exports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema, Default,
)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    /// Content-Type header for a download in this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single audit trail entry. Entries are immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLogResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AuditLogId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub account_id: Option<AccountId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub actor_id: Option<UserId>,
    /// Email of the actor at the time of the action. Kept even after the
    /// actor is deleted.
    pub actor_email: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLogDBResponse> for AuditLogResponse {
    fn from(entry: AuditLogDBResponse) -> Self {
        Self {
            id: entry.id,
            account_id: entry.account_id,
            actor_id: entry.actor_id,
            actor_email: entry.actor_email,
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            details: entry.details,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListAuditLogsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub actor_id: Option<UserId>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    /// Inclusive lower bound on entry time.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on entry time.
    pub to: Option<DateTime<Utc>>,
}

/// Request body for creating an audit export. The filter is frozen into the
/// export, so later downloads return the rows that matched at creation time
/// plus any matching entries appended since; the recorded `row_count` always
/// refers to creation time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditExportCreate {
    #[serde(default)]
    pub format: ExportFormat,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditExportResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AuditExportId,
    #[schema(value_type = String, format = "uuid")]
    pub requested_by: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub account_id: Option<AccountId>,
    pub format: ExportFormat,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    /// Number of entries that matched the filter when the export was created.
    pub row_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<AuditExportDBResponse> for AuditExportResponse {
    fn from(export: AuditExportDBResponse) -> Self {
        Self {
            id: export.id,
            requested_by: export.requested_by,
            account_id: export.account_id,
            format: export.format,
            from: export.from_time,
            to: export.to_time,
            action: export.action,
            resource_type: export.resource_type,
            row_count: export.row_count,
            created_at: export.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListAuditExportsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
