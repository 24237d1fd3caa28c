//! Database queries for the audit trail and audit exports.
//!
//! Audit entries are append-only. Exports snapshot a filter at creation time;
//! downloads re-run the stored filter so the content matches what the export
//! counted.

use crate::types::{AccountId, AuditExportId, UserId, abbrev_uuid};
use crate::db::{
    errors::Result,
    models::audit::{AuditExportCreateDBRequest, AuditExportDBResponse, AuditLogCreateDBRequest, AuditLogDBResponse},
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing audit log entries
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub account_id: Option<AccountId>,
    pub actor_id: Option<UserId>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub skip: i64,
    pub limit: i64,
}

impl AuditLogFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

pub struct AuditLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AuditLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(action = %request.action, resource_type = %request.resource_type), err)]
    pub async fn record(&mut self, request: &AuditLogCreateDBRequest) -> Result<AuditLogDBResponse> {
        let entry = sqlx::query_as::<_, AuditLogDBResponse>(
            r#"
            INSERT INTO audit_logs (id, account_id, actor_id, actor_email, action, resource_type, resource_id, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.account_id)
        .bind(request.actor_id)
        .bind(&request.actor_email)
        .bind(&request.action)
        .bind(&request.resource_type)
        .bind(&request.resource_id)
        .bind(&request.details)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(entry)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &AuditLogFilter) -> Result<Vec<AuditLogDBResponse>> {
        let entries = sqlx::query_as::<_, AuditLogDBResponse>(
            r#"
            SELECT * FROM audit_logs
            WHERE ($1::uuid IS NULL OR account_id = $1)
              AND ($2::uuid IS NULL OR actor_id = $2)
              AND ($3::text IS NULL OR action = $3)
              AND ($4::text IS NULL OR resource_type = $4)
              AND ($5::timestamptz IS NULL OR created_at >= $5)
              AND ($6::timestamptz IS NULL OR created_at <= $6)
            ORDER BY created_at DESC LIMIT $7 OFFSET $8
            "#,
        )
        .bind(filter.account_id)
        .bind(filter.actor_id)
        .bind(&filter.action)
        .bind(&filter.resource_type)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(entries)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &AuditLogFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM audit_logs
            WHERE ($1::uuid IS NULL OR account_id = $1)
              AND ($2::uuid IS NULL OR actor_id = $2)
              AND ($3::text IS NULL OR action = $3)
              AND ($4::text IS NULL OR resource_type = $4)
              AND ($5::timestamptz IS NULL OR created_at >= $5)
              AND ($6::timestamptz IS NULL OR created_at <= $6)
            "#,
        )
        .bind(filter.account_id)
        .bind(filter.actor_id)
        .bind(&filter.action)
        .bind(&filter.resource_type)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    /// Fetch every entry matching an export's stored filter, oldest first.
    #[instrument(skip(self, export), fields(export_id = %abbrev_uuid(&export.id)), err)]
    pub async fn export_rows(&mut self, export: &AuditExportDBResponse) -> Result<Vec<AuditLogDBResponse>> {
        let entries = sqlx::query_as::<_, AuditLogDBResponse>(
            r#"
            SELECT * FROM audit_logs
            WHERE ($1::uuid IS NULL OR account_id = $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::text IS NULL OR resource_type = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at <= $5)
            ORDER BY created_at ASC
            "#,
        )
        .bind(export.account_id)
        .bind(&export.action)
        .bind(&export.resource_type)
        .bind(export.from_time)
        .bind(export.to_time)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(entries)
    }
}

/// Filter for listing audit exports
#[derive(Debug, Clone)]
pub struct AuditExportFilter {
    pub account_id: Option<AccountId>,
    pub skip: i64,
    pub limit: i64,
}

impl AuditExportFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            account_id: None,
            skip,
            limit,
        }
    }
}

pub struct AuditExports<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AuditExports<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create an export job. The matching row count is computed in the same
    /// transaction as the insert so it reflects the log at creation time.
    #[instrument(skip(self, request), fields(requested_by = %abbrev_uuid(&request.requested_by)), err)]
    pub async fn create(&mut self, request: &AuditExportCreateDBRequest) -> Result<AuditExportDBResponse> {
        let mut tx = self.db.begin().await?;

        let row_count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM audit_logs
            WHERE ($1::uuid IS NULL OR account_id = $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::text IS NULL OR resource_type = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at <= $5)
            "#,
        )
        .bind(request.account_id)
        .bind(&request.action)
        .bind(&request.resource_type)
        .bind(request.from_time)
        .bind(request.to_time)
        .fetch_one(&mut *tx)
        .await?;

        let export = sqlx::query_as::<_, AuditExportDBResponse>(
            r#"
            INSERT INTO audit_exports (id, requested_by, account_id, format, from_time, to_time, action, resource_type, row_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.requested_by)
        .bind(request.account_id)
        .bind(request.format)
        .bind(request.from_time)
        .bind(request.to_time)
        .bind(&request.action)
        .bind(&request.resource_type)
        .bind(row_count)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(export)
    }

    #[instrument(skip(self), fields(export_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: AuditExportId) -> Result<Option<AuditExportDBResponse>> {
        let export = sqlx::query_as::<_, AuditExportDBResponse>("SELECT * FROM audit_exports WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(export)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &AuditExportFilter) -> Result<Vec<AuditExportDBResponse>> {
        let exports = sqlx::query_as::<_, AuditExportDBResponse>(
            r#"
            SELECT * FROM audit_exports
            WHERE ($1::uuid IS NULL OR account_id = $1)
            ORDER BY created_at DESC LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.account_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(exports)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &AuditExportFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM audit_exports WHERE ($1::uuid IS NULL OR account_id = $1)")
            .bind(filter.account_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::accounts::AccountCreate;
    use crate::api::models::audit::ExportFormat;
    use crate::api::models::users::UserStatus;
    use crate::db::handlers::repository::Repository;
    use crate::db::handlers::{Accounts, Users};
    use crate::db::models::accounts::AccountCreateDBRequest;
    use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
    use sqlx::PgPool;

    async fn seed_actor(conn: &mut sqlx::PgConnection) -> UserDBResponse {
        let account = Accounts::new(conn)
            .create(&AccountCreateDBRequest::from(AccountCreate {
                name: "Acme Inc".to_string(),
                slug: None,
                plan: None,
                contact_email: None,
                settings: None,
            }))
            .await
            .unwrap();

        Users::new(conn)
            .create(&UserCreateDBRequest {
                account_id: account.id,
                username: "auditor".to_string(),
                email: "auditor@acme.test".to_string(),
                display_name: None,
                status: UserStatus::Active,
                is_admin: false,
                password_hash: None,
            })
            .await
            .unwrap()
    }

    fn user_created_entry(actor: &UserDBResponse) -> AuditLogCreateDBRequest {
        AuditLogCreateDBRequest {
            account_id: Some(actor.account_id),
            actor_id: Some(actor.id),
            actor_email: Some(actor.email.clone()),
            action: "user.created".to_string(),
            resource_type: "user".to_string(),
            resource_id: Some(Uuid::new_v4().to_string()),
            details: serde_json::json!({"username": "newcomer"}),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_record_and_list(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let actor = seed_actor(&mut conn).await;
        let mut repo = AuditLogs::new(&mut conn);

        repo.record(&user_created_entry(&actor)).await.unwrap();
        repo.record(&AuditLogCreateDBRequest {
            action: "user.deleted".to_string(),
            ..user_created_entry(&actor)
        })
        .await
        .unwrap();

        let filter = AuditLogFilter::new(0, 10);
        let entries = repo.list(&filter).await.unwrap();
        assert_eq!(entries.len(), 2);
        // Newest first
        assert_eq!(entries[0].action, "user.deleted");

        let mut filter = AuditLogFilter::new(0, 10);
        filter.action = Some("user.created".to_string());
        let created_only = repo.list(&filter).await.unwrap();
        assert_eq!(created_only.len(), 1);
        assert_eq!(created_only[0].actor_email, Some("auditor@acme.test".to_string()));
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_entries_survive_actor_deletion(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let actor = seed_actor(&mut conn).await;

        AuditLogs::new(&mut conn).record(&user_created_entry(&actor)).await.unwrap();

        Users::new(&mut conn).delete(actor.id).await.unwrap();

        let entries = AuditLogs::new(&mut conn).list(&AuditLogFilter::new(0, 10)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor_id, Some(actor.id));
        assert_eq!(entries[0].actor_email, Some("auditor@acme.test".to_string()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_export_snapshots_filter(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let actor = seed_actor(&mut conn).await;

        let mut logs = AuditLogs::new(&mut conn);
        logs.record(&user_created_entry(&actor)).await.unwrap();
        logs.record(&AuditLogCreateDBRequest {
            action: "user.deleted".to_string(),
            ..user_created_entry(&actor)
        })
        .await
        .unwrap();

        let export = AuditExports::new(&mut conn)
            .create(&AuditExportCreateDBRequest {
                requested_by: actor.id,
                account_id: Some(actor.account_id),
                format: ExportFormat::Csv,
                from_time: None,
                to_time: None,
                action: Some("user.created".to_string()),
                resource_type: None,
            })
            .await
            .unwrap();

        assert_eq!(export.row_count, 1);
        assert_eq!(export.format, ExportFormat::Csv);

        let rows = AuditLogs::new(&mut conn).export_rows(&export).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "user.created");

        let fetched = AuditExports::new(&mut conn).get_by_id(export.id).await.unwrap().unwrap();
        assert_eq!(fetched.row_count, 1);
        assert_eq!(fetched.action, Some("user.created".to_string()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_export_rows_are_oldest_first(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let actor = seed_actor(&mut conn).await;

        let mut logs = AuditLogs::new(&mut conn);
        logs.record(&user_created_entry(&actor)).await.unwrap();
        logs.record(&AuditLogCreateDBRequest {
            action: "user.updated".to_string(),
            ..user_created_entry(&actor)
        })
        .await
        .unwrap();

        let export = AuditExports::new(&mut conn)
            .create(&AuditExportCreateDBRequest {
                requested_by: actor.id,
                account_id: None,
                format: ExportFormat::Json,
                from_time: None,
                to_time: None,
                action: None,
                resource_type: None,
            })
            .await
            .unwrap();
        assert_eq!(export.row_count, 2);

        let rows = AuditLogs::new(&mut conn).export_rows(&export).await.unwrap();
        assert_eq!(rows[0].action, "user.created");
        assert_eq!(rows[1].action, "user.updated");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_exports_by_account(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let actor = seed_actor(&mut conn).await;

        let mut exports = AuditExports::new(&mut conn);
        exports
            .create(&AuditExportCreateDBRequest {
                requested_by: actor.id,
                account_id: Some(actor.account_id),
                format: ExportFormat::Csv,
                from_time: None,
                to_time: None,
                action: None,
                resource_type: None,
            })
            .await
            .unwrap();

        let mut filter = AuditExportFilter::new(0, 10);
        filter.account_id = Some(actor.account_id);
        assert_eq!(exports.list(&filter).await.unwrap().len(), 1);

        filter.account_id = Some(Uuid::new_v4());
        assert!(exports.list(&filter).await.unwrap().is_empty());
    }
}
