//! Database models for per-key API request accounting.

use crate::types::{ApiKeyId, ApiRequestId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for recording a served API request
#[derive(Debug, Clone)]
pub struct ApiRequestCreateDBRequest {
    pub api_key_id: ApiKeyId,
    pub method: String,
    pub path: String,
    pub status_code: i32,
    pub duration_ms: i64,
}

/// Database response for a recorded API request
#[derive(Debug, Clone, FromRow)]
pub struct ApiRequestDBResponse {
    pub id: ApiRequestId,
    pub api_key_id: ApiKeyId,
    pub method: String,
    pub path: String,
    pub status_code: i32,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}
