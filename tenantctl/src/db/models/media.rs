//! Database models for stored media objects.
//!
//! Media bytes live in the database (BYTEA); metadata responses never carry
//! the payload, downloads fetch it separately.

use crate::types::{AccountId, MediaId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for storing an uploaded media object. Size and checksum
/// are derived from `data` in the repository.
#[derive(Debug, Clone)]
pub struct MediaCreateDBRequest {
    pub account_id: AccountId,
    pub uploaded_by: UserId,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Database response for media metadata
#[derive(Debug, Clone, FromRow)]
pub struct MediaDBResponse {
    pub id: MediaId,
    pub account_id: AccountId,
    pub uploaded_by: UserId,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
