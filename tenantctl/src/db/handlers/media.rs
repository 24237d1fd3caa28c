//! Database repository for uploaded media files.
//!
//! File content lives in the same table as the metadata. Reads are split so
//! listings never drag blob columns across the wire; `get_data` is the only
//! way to load content.

use crate::types::{AccountId, MediaId, abbrev_uuid};
use crate::{
    crypto::sha256_hex,
    db::{
        errors::Result,
        models::media::{MediaCreateDBRequest, MediaDBResponse},
    },
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

const METADATA_COLUMNS: &str = "id, account_id, uploaded_by, filename, content_type, size_bytes, checksum, created_at, deleted_at";

/// Filter for listing media
#[derive(Debug, Clone)]
pub struct MediaFilter {
    pub account_id: Option<AccountId>,
    pub skip: i64,
    pub limit: i64,
}

impl MediaFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            account_id: None,
            skip,
            limit,
        }
    }
}

pub struct Media<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Media<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Store an uploaded file. Size and checksum are derived from the content
    /// here so they can never disagree with what was stored.
    #[instrument(skip(self, request), fields(filename = %request.filename, bytes = request.data.len()), err)]
    pub async fn create(&mut self, request: &MediaCreateDBRequest) -> Result<MediaDBResponse> {
        let checksum = sha256_hex(&request.data);
        let size_bytes = request.data.len() as i64;

        let media = sqlx::query_as::<_, MediaDBResponse>(&format!(
            r#"
            INSERT INTO media (id, account_id, uploaded_by, filename, content_type, size_bytes, checksum, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {METADATA_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.account_id)
        .bind(request.uploaded_by)
        .bind(&request.filename)
        .bind(&request.content_type)
        .bind(size_bytes)
        .bind(&checksum)
        .bind(&request.data)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(media)
    }

    #[instrument(skip(self), fields(media_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: MediaId) -> Result<Option<MediaDBResponse>> {
        let media = sqlx::query_as::<_, MediaDBResponse>(&format!(
            "SELECT {METADATA_COLUMNS} FROM media WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(media)
    }

    /// Load the raw file content.
    #[instrument(skip(self), fields(media_id = %abbrev_uuid(&id)), err)]
    pub async fn get_data(&mut self, id: MediaId) -> Result<Option<Vec<u8>>> {
        let data = sqlx::query_scalar::<_, Vec<u8>>("SELECT data FROM media WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(data)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &MediaFilter) -> Result<Vec<MediaDBResponse>> {
        let media = sqlx::query_as::<_, MediaDBResponse>(&format!(
            r#"
            SELECT {METADATA_COLUMNS} FROM media
            WHERE deleted_at IS NULL AND ($1::uuid IS NULL OR account_id = $1)
            ORDER BY created_at DESC LIMIT $2 OFFSET $3
            "#
        ))
        .bind(filter.account_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(media)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &MediaFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM media WHERE deleted_at IS NULL AND ($1::uuid IS NULL OR account_id = $1)",
        )
        .bind(filter.account_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    /// Soft-delete a file. Content stays in the table but is unreachable.
    #[instrument(skip(self), fields(media_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: MediaId) -> Result<bool> {
        let result = sqlx::query("UPDATE media SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
