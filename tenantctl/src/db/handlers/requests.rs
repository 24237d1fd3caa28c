//! Database queries for per-request API usage records.

use crate::types::{ApiKeyId, UserId, abbrev_uuid};
use crate::db::{
    errors::Result,
    models::requests::{ApiRequestCreateDBRequest, ApiRequestDBResponse},
};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing request records
#[derive(Debug, Clone, Default)]
pub struct ApiRequestFilter {
    pub api_key_id: Option<ApiKeyId>,
    pub user_id: Option<UserId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub skip: i64,
    pub limit: i64,
}

impl ApiRequestFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

pub struct ApiRequests<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ApiRequests<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert one usage record. Called from the request logging middleware
    /// after the response has been sent.
    #[instrument(skip(self, request), fields(api_key_id = %abbrev_uuid(&request.api_key_id), path = %request.path), err)]
    pub async fn record(&mut self, request: &ApiRequestCreateDBRequest) -> Result<ApiRequestDBResponse> {
        let record = sqlx::query_as::<_, ApiRequestDBResponse>(
            r#"
            INSERT INTO api_requests (id, api_key_id, method, path, status_code, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.api_key_id)
        .bind(&request.method)
        .bind(&request.path)
        .bind(request.status_code)
        .bind(request.duration_ms)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(record)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &ApiRequestFilter) -> Result<Vec<ApiRequestDBResponse>> {
        let records = sqlx::query_as::<_, ApiRequestDBResponse>(
            r#"
            SELECT r.* FROM api_requests r
            JOIN api_keys k ON k.id = r.api_key_id
            WHERE ($1::uuid IS NULL OR r.api_key_id = $1)
              AND ($2::uuid IS NULL OR k.user_id = $2)
              AND ($3::timestamptz IS NULL OR r.created_at >= $3)
              AND ($4::timestamptz IS NULL OR r.created_at <= $4)
            ORDER BY r.created_at DESC LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.api_key_id)
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(records)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ApiRequestFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM api_requests r
            JOIN api_keys k ON k.id = r.api_key_id
            WHERE ($1::uuid IS NULL OR r.api_key_id = $1)
              AND ($2::uuid IS NULL OR k.user_id = $2)
              AND ($3::timestamptz IS NULL OR r.created_at >= $3)
              AND ($4::timestamptz IS NULL OR r.created_at <= $4)
            "#,
        )
        .bind(filter.api_key_id)
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}
