//! API models for querying the per-key request usage log.

use super::pagination::Pagination;
use crate::db::models::requests::ApiRequestDBResponse;
use crate::types::{ApiKeyId, ApiRequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// A single recorded API request, attributed to the key that made it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiRequestResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ApiRequestId,
    #[schema(value_type = String, format = "uuid")]
    pub api_key_id: ApiKeyId,
    pub method: String,
    pub path: String,
    pub status_code: i32,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl From<ApiRequestDBResponse> for ApiRequestResponse {
    fn from(request: ApiRequestDBResponse) -> Self {
        Self {
            id: request.id,
            api_key_id: request.api_key_id,
            method: request.method,
            path: request.path,
            status_code: request.status_code,
            duration_ms: request.duration_ms,
            created_at: request.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListRequestsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Inclusive lower bound on request time.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on request time.
    pub to: Option<DateTime<Utc>>,
}
