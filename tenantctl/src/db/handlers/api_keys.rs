//! Database repository for API keys.

use crate::types::{ApiKeyId, UserId, abbrev_uuid};
use crate::{
    api::models::api_keys::ApiKeyStatus,
    crypto::generate_api_key,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::api_keys::{ApiKeyCreateDBRequest, ApiKeyDBResponse, ApiKeyUpdateDBRequest},
    },
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing API keys
#[derive(Debug, Clone)]
pub struct ApiKeyFilter {
    pub user_id: Option<UserId>,
    pub status: Option<ApiKeyStatus>,
    pub skip: i64,
    pub limit: i64,
}

impl ApiKeyFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            user_id: None,
            status: None,
            skip,
            limit,
        }
    }
}

pub struct ApiKeys<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for ApiKeys<'c> {
    type CreateRequest = ApiKeyCreateDBRequest;
    type UpdateRequest = ApiKeyUpdateDBRequest;
    type Response = ApiKeyDBResponse;
    type Id = ApiKeyId;
    type Filter = ApiKeyFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let key_id = Uuid::new_v4();
        // Generate a secure API key
        let secret = generate_api_key();

        let key = sqlx::query_as::<_, ApiKeyDBResponse>(
            r#"
            INSERT INTO api_keys (id, user_id, name, secret, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(key_id)
        .bind(request.user_id)
        .bind(&request.name)
        .bind(&secret)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(key)
    }

    #[instrument(skip(self), fields(api_key_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>("SELECT * FROM api_keys WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(key)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ApiKeyId>) -> Result<std::collections::HashMap<Self::Id, ApiKeyDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let keys = sqlx::query_as::<_, ApiKeyDBResponse>("SELECT * FROM api_keys WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(keys.into_iter().map(|k| (k.id, k)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let keys = sqlx::query_as::<_, ApiKeyDBResponse>(
            r#"
            SELECT * FROM api_keys
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(keys)
    }

    /// Revoke an API key. Keys are never hard-deleted so usage history stays attributable.
    #[instrument(skip(self), fields(api_key_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result =
            sqlx::query("UPDATE api_keys SET status = 'revoked', revoked_at = NOW() WHERE id = $1 AND status = 'active'")
                .bind(id)
                .execute(&mut *self.db)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(api_key_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>(
            r#"
            UPDATE api_keys SET name = COALESCE($2, name)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(key)
    }
}

impl<'c> ApiKeys<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up a key by its secret for request authentication.
    ///
    /// Returns revoked and expired keys too; callers decide via
    /// [`ApiKeyDBResponse::is_usable`] so they can distinguish unknown keys
    /// from dead ones.
    #[instrument(skip_all, err)]
    pub async fn find_by_secret(&mut self, secret: &str) -> Result<Option<ApiKeyDBResponse>> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>("SELECT * FROM api_keys WHERE secret = $1")
            .bind(secret)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(key)
    }

    #[instrument(skip(self), fields(api_key_id = %abbrev_uuid(&id)), err)]
    pub async fn touch_last_used(&mut self, id: ApiKeyId) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ApiKeyFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM api_keys
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(filter.user_id)
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
    use crate::api::models::api_keys::ApiKeyCreate;
    use crate::api::models::users::UserStatus;
    use crate::db::handlers::{Accounts, Users};
    use crate::db::models::accounts::AccountCreateDBRequest;
    use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    async fn seed_user(conn: &mut sqlx::PgConnection) -> UserDBResponse {
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
                username: "worker".to_string(),
                email: "worker@acme.test".to_string(),
                display_name: None,
                status: UserStatus::Active,
                is_admin: false,
                password_hash: None,
            })
            .await
            .unwrap()
    }

    fn ci_create(user_id: UserId) -> ApiKeyCreateDBRequest {
        ApiKeyCreateDBRequest::from_api(
            user_id,
            ApiKeyCreate {
                name: "ci".to_string(),
                expires_at: None,
            },
        )
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_api_key(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = seed_user(&mut conn).await;
        let mut repo = ApiKeys::new(&mut conn);

        let key = repo.create(&ci_create(user.id)).await.unwrap();

        assert!(key.secret.starts_with("ak-"));
        assert_eq!(key.status, ApiKeyStatus::Active);
        assert!(key.is_usable());
        assert!(key.revoked_at.is_none());
        assert!(key.last_used_at.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_find_by_secret(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = seed_user(&mut conn).await;
        let mut repo = ApiKeys::new(&mut conn);

        let key = repo.create(&ci_create(user.id)).await.unwrap();

        let found = repo.find_by_secret(&key.secret).await.unwrap().unwrap();
        assert_eq!(found.id, key.id);

        assert!(repo.find_by_secret("ak-does-not-exist").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_revoke_is_one_way(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = seed_user(&mut conn).await;
        let mut repo = ApiKeys::new(&mut conn);

        let key = repo.create(&ci_create(user.id)).await.unwrap();

        assert!(repo.delete(key.id).await.unwrap());

        let revoked = repo.get_by_id(key.id).await.unwrap().unwrap();
        assert_eq!(revoked.status, ApiKeyStatus::Revoked);
        assert!(revoked.revoked_at.is_some());
        assert!(!revoked.is_usable());

        // Revoking twice is a no-op
        assert!(!repo.delete(key.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_expired_key_is_not_usable(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = seed_user(&mut conn).await;
        let mut repo = ApiKeys::new(&mut conn);

        let key = repo
            .create(&ApiKeyCreateDBRequest {
                user_id: user.id,
                name: "stale".to_string(),
                expires_at: Some(Utc::now() - Duration::hours(1)),
            })
            .await
            .unwrap();

        assert_eq!(key.status, ApiKeyStatus::Active);
        assert!(!key.is_usable());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_rename_keeps_secret(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = seed_user(&mut conn).await;
        let mut repo = ApiKeys::new(&mut conn);

        let key = repo.create(&ci_create(user.id)).await.unwrap();

        let renamed = repo
            .update(
                key.id,
                &ApiKeyUpdateDBRequest {
                    name: Some("release".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(renamed.name, "release");
        assert_eq!(renamed.secret, key.secret);

        let missing = repo
            .update(Uuid::new_v4(), &ApiKeyUpdateDBRequest::default())
            .await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_touch_last_used(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = seed_user(&mut conn).await;
        let mut repo = ApiKeys::new(&mut conn);

        let key = repo.create(&ci_create(user.id)).await.unwrap();

        repo.touch_last_used(key.id).await.unwrap();

        let touched = repo.get_by_id(key.id).await.unwrap().unwrap();
        assert!(touched.last_used_at.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = seed_user(&mut conn).await;
        let mut repo = ApiKeys::new(&mut conn);

        let first = repo.create(&ci_create(user.id)).await.unwrap();
        repo.create(&ApiKeyCreateDBRequest::from_api(
            user.id,
            ApiKeyCreate {
                name: "deploy".to_string(),
                expires_at: None,
            },
        ))
        .await
        .unwrap();

        repo.delete(first.id).await.unwrap();

        let mut filter = ApiKeyFilter::new(0, 10);
        filter.user_id = Some(user.id);
        assert_eq!(repo.list(&filter).await.unwrap().len(), 2);
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        filter.status = Some(ApiKeyStatus::Active);
        let active = repo.list(&filter).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "deploy");
    }
}
