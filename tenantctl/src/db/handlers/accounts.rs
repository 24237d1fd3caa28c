//! Database repository for tenant accounts.

use crate::types::{AccountId, Operation, abbrev_uuid};
use crate::{
    api::models::accounts::AccountStatus,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::accounts::{AccountCreateDBRequest, AccountDBResponse, AccountUpdateDBRequest},
    },
};
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing accounts
#[derive(Debug, Clone)]
pub struct AccountFilter {
    pub status: Option<AccountStatus>,
    pub skip: i64,
    pub limit: i64,
}

impl AccountFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { status: None, skip, limit }
    }
}

pub struct Accounts<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Accounts<'c> {
    type CreateRequest = AccountCreateDBRequest;
    type UpdateRequest = AccountUpdateDBRequest;
    type Response = AccountDBResponse;
    type Id = AccountId;
    type Filter = AccountFilter;

    #[instrument(skip(self, request), fields(slug = %request.slug), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // Always generate a new ID for accounts
        let account_id = Uuid::new_v4();

        let account = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            INSERT INTO accounts (id, name, slug, plan, contact_email, settings)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(&request.name)
        .bind(&request.slug)
        .bind(&request.plan)
        .bind(&request.contact_email)
        .bind(&request.settings)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let account = sqlx::query_as::<_, AccountDBResponse>("SELECT * FROM accounts WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(account)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<AccountId>) -> Result<std::collections::HashMap<Self::Id, AccountDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let accounts =
            sqlx::query_as::<_, AccountDBResponse>("SELECT * FROM accounts WHERE id = ANY($1) AND deleted_at IS NULL")
                .bind(&ids)
                .fetch_all(&mut *self.db)
                .await?;

        Ok(accounts.into_iter().map(|a| (a.id, a)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let accounts = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            SELECT * FROM accounts
            WHERE deleted_at IS NULL AND ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(accounts)
    }

    /// Close an account: soft-delete it and retire its users in the same transaction.
    ///
    /// Accounts that still have active platform administrators are protected.
    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let admin_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE account_id = $1 AND is_admin = TRUE AND status = 'active' AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if admin_count > 0 {
            return Err(DbError::ProtectedEntity {
                operation: Operation::Delete,
                reason: "account still has active platform administrators".to_string(),
                entity_type: "account".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query(
            "UPDATE accounts SET deleted_at = NOW(), status = 'closed', updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        // Users cannot outlive their account
        sqlx::query("UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE account_id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(true)
    }

    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Atomic update with conditional field updates
        let account = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            UPDATE accounts SET
                name = COALESCE($2, name),
                plan = COALESCE($3, plan),
                contact_email = COALESCE($4, contact_email),
                settings = COALESCE($5, settings),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.plan)
        .bind(&request.contact_email)
        .bind(&request.settings)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(account)
    }
}

impl<'c> Accounts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, slug), err)]
    pub async fn get_by_slug(&mut self, slug: &str) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, AccountDBResponse>("SELECT * FROM accounts WHERE slug = $1 AND deleted_at IS NULL")
            .bind(slug)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(account)
    }

    /// Transition an account between active and suspended.
    ///
    /// Closed accounts are excluded; closing is one-way and goes through `delete`.
    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id), status = %status), err)]
    pub async fn set_status(&mut self, id: AccountId, status: AccountStatus) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, AccountDBResponse>(
            "UPDATE accounts SET status = $2, \
             suspended_at = CASE WHEN $2 = 'suspended' THEN NOW() ELSE NULL END, \
             updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &AccountFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM accounts WHERE deleted_at IS NULL AND ($1::text IS NULL OR status = $1)",
        )
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::api::models::accounts::AccountCreate;
    use crate::api::models::users::UserStatus;
    use crate::db::handlers::Users;
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    fn acme_create() -> AccountCreateDBRequest {
        AccountCreateDBRequest::from(AccountCreate {
            name: "Acme Inc".to_string(),
            slug: None,
            plan: Some("team".to_string()),
            contact_email: Some("ops@acme.test".to_string()),
            settings: None,
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_account_generates_slug(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        let account = repo.create(&acme_create()).await.unwrap();

        assert_eq!(account.name, "Acme Inc");
        assert_eq!(account.slug, "acme-inc");
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.plan, "team");
        assert!(account.deleted_at.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_slug_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        repo.create(&acme_create()).await.unwrap();
        let err = repo.create(&acme_create()).await.unwrap_err();

        match err {
            DbError::UniqueViolation {
                constraint,
                conflicting_value,
                ..
            } => {
                assert_eq!(constraint.as_deref(), Some("accounts_slug_key"));
                assert_eq!(conflicting_value.as_deref(), Some("acme-inc"));
            }
            other => panic!("Expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_is_partial(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        let account = repo.create(&acme_create()).await.unwrap();

        let updated = repo
            .update(
                account.id,
                &AccountUpdateDBRequest {
                    plan: Some("enterprise".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.plan, "enterprise");
        // Untouched fields survive
        assert_eq!(updated.name, "Acme Inc");
        assert_eq!(updated.slug, "acme-inc");
        assert_eq!(updated.contact_email, Some("ops@acme.test".to_string()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_suspend_and_reactivate(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        let account = repo.create(&acme_create()).await.unwrap();

        let suspended = repo.set_status(account.id, AccountStatus::Suspended).await.unwrap().unwrap();
        assert_eq!(suspended.status, AccountStatus::Suspended);
        assert!(suspended.suspended_at.is_some());

        let reactivated = repo.set_status(account.id, AccountStatus::Active).await.unwrap().unwrap();
        assert_eq!(reactivated.status, AccountStatus::Active);
        assert!(reactivated.suspended_at.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_close_account_retires_users(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let account = Accounts::new(&mut conn).create(&acme_create()).await.unwrap();

        let user = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                account_id: account.id,
                username: "worker".to_string(),
                email: "worker@acme.test".to_string(),
                display_name: None,
                status: UserStatus::Active,
                is_admin: false,
                password_hash: None,
            })
            .await
            .unwrap();

        let deleted = Accounts::new(&mut conn).delete(account.id).await.unwrap();
        assert!(deleted);

        // Account is gone from reads, and so is its user
        assert!(Accounts::new(&mut conn).get_by_id(account.id).await.unwrap().is_none());
        assert!(Users::new(&mut conn).get_by_id(user.id).await.unwrap().is_none());

        // Closing twice is a no-op
        let deleted_again = Accounts::new(&mut conn).delete(account.id).await.unwrap();
        assert!(!deleted_again);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_close_account_with_active_admin_is_protected(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let account = Accounts::new(&mut conn).create(&acme_create()).await.unwrap();

        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                account_id: account.id,
                username: "root".to_string(),
                email: "root@acme.test".to_string(),
                display_name: None,
                status: UserStatus::Active,
                is_admin: true,
                password_hash: None,
            })
            .await
            .unwrap();

        let err = Accounts::new(&mut conn).delete(account.id).await.unwrap_err();
        assert!(matches!(err, DbError::ProtectedEntity { .. }));

        // Nothing was touched
        let account = Accounts::new(&mut conn).get_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(account.status, AccountStatus::Active);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_by_status(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        let first = repo.create(&acme_create()).await.unwrap();
        repo.create(&AccountCreateDBRequest::from(AccountCreate {
            name: "Globex".to_string(),
            slug: None,
            plan: None,
            contact_email: None,
            settings: None,
        }))
        .await
        .unwrap();

        repo.set_status(first.id, AccountStatus::Suspended).await.unwrap();

        let mut filter = AccountFilter::new(0, 10);
        assert_eq!(repo.list(&filter).await.unwrap().len(), 2);
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        filter.status = Some(AccountStatus::Suspended);
        let suspended = repo.list(&filter).await.unwrap();
        assert_eq!(suspended.len(), 1);
        assert_eq!(suspended[0].id, first.id);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }
}
