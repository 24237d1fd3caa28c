//! API response models for media objects.
//!
//! Uploads arrive as multipart form data, so there is no JSON create model;
//! the upload handler builds the database request from the multipart parts.

use super::pagination::Pagination;
use crate::db::models::media::MediaDBResponse;
use crate::types::{AccountId, MediaId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Media metadata. The content itself is served from the download endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MediaResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MediaId,
    #[schema(value_type = String, format = "uuid")]
    pub account_id: AccountId,
    #[schema(value_type = String, format = "uuid")]
    pub uploaded_by: UserId,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Hex-encoded SHA-256 of the stored content.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl From<MediaDBResponse> for MediaResponse {
    fn from(media: MediaDBResponse) -> Self {
        Self {
            id: media.id,
            account_id: media.account_id,
            uploaded_by: media.uploaded_by,
            filename: media.filename,
            content_type: media.content_type,
            size_bytes: media.size_bytes,
            checksum: media.checksum,
            created_at: media.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListMediaQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
