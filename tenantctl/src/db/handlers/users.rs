//! Database repository for users.

use crate::types::{AccountId, Operation, UserId, abbrev_uuid};
use crate::{
    api::models::{roles::RoleRef, users::UserStatus},
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub account_id: Option<AccountId>,
    pub status: Option<UserStatus>,
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            account_id: None,
            status: None,
            skip,
            limit,
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub status: UserStatus,
    pub is_admin: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl From<(Vec<RoleRef>, User)> for UserDBResponse {
    fn from((roles, user): (Vec<RoleRef>, User)) -> Self {
        Self {
            id: user.id,
            account_id: user.account_id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            status: user.status,
            is_admin: user.is_admin,
            roles,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
            deleted_at: user.deleted_at,
            password_hash: user.password_hash,
        }
    }
}

const ROLE_REFS_SQL: &str = r#"
    SELECT r.id, r.name FROM user_roles ur
    JOIN roles r ON r.id = ur.role_id
    WHERE ur.user_id = $1
    ORDER BY r.name
"#;

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // Always generate a new ID for users
        let user_id = Uuid::new_v4();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, account_id, username, email, display_name, status, is_admin, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.account_id)
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(request.status)
        .bind(request.is_admin)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;

        // New users start without role assignments
        Ok(UserDBResponse::from((Vec::new(), user)))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        if let Some(user) = user {
            let roles = sqlx::query_as::<_, RoleRef>(ROLE_REFS_SQL)
                .bind(id)
                .fetch_all(&mut *self.db)
                .await?;

            Ok(Some(UserDBResponse::from((roles, user))))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<UserId>) -> Result<std::collections::HashMap<Self::Id, UserDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let mut tx = self.db.begin().await?;

        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1) AND deleted_at IS NULL")
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;

        let mut result = std::collections::HashMap::new();

        for user in users {
            let roles = sqlx::query_as::<_, RoleRef>(ROLE_REFS_SQL)
                .bind(user.id)
                .fetch_all(&mut *tx)
                .await?;

            result.insert(user.id, UserDBResponse::from((roles, user)));
        }
        tx.commit().await?;

        Ok(result)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE deleted_at IS NULL
              AND ($1::uuid IS NULL OR account_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.account_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        let mut tx = self.db.begin().await?;

        let mut result = Vec::new();
        for user in users {
            let roles = sqlx::query_as::<_, RoleRef>(ROLE_REFS_SQL)
                .bind(user.id)
                .fetch_all(&mut *tx)
                .await?;

            result.push(UserDBResponse::from((roles, user)));
        }
        tx.commit().await?;
        Ok(result)
    }

    /// Soft-delete a user. The last remaining platform administrator is protected.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let is_admin = sqlx::query_scalar::<_, bool>("SELECT is_admin FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(is_admin) = is_admin else {
            return Ok(false);
        };

        if is_admin {
            let other_admins = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM users WHERE is_admin = TRUE AND deleted_at IS NULL AND id != $1",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

            if other_admins == 0 {
                return Err(DbError::ProtectedEntity {
                    operation: Operation::Delete,
                    reason: "cannot delete the last platform administrator".to_string(),
                    entity_type: "user".to_string(),
                    entity_id: Some(id.to_string()),
                });
            }
        }

        let result = sqlx::query("UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Atomic update with conditional field updates
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                status = COALESCE($3, status),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.display_name)
        .bind(request.status)
        .bind(&request.password_hash)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        let roles = sqlx::query_as::<_, RoleRef>(ROLE_REFS_SQL)
            .bind(id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(UserDBResponse::from((roles, user)))
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 AND deleted_at IS NULL")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        if let Some(user) = user {
            let roles = sqlx::query_as::<_, RoleRef>(ROLE_REFS_SQL)
                .bind(user.id)
                .fetch_all(&mut *self.db)
                .await?;

            Ok(Some(UserDBResponse::from((roles, user))))
        } else {
            Ok(None)
        }
    }

    /// Stamp a successful authentication.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn record_login(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &UserFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM users
            WHERE deleted_at IS NULL
              AND ($1::uuid IS NULL OR account_id = $1)
              AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(filter.account_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}
