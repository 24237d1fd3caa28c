//! Database repository for roles and role assignments.

use crate::types::{AccountId, Operation, RoleId, UserId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::roles::{RoleCreateDBRequest, RoleDBResponse, RoleUpdateDBRequest},
};
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing roles
#[derive(Debug, Clone)]
pub struct RoleFilter {
    /// Scope to one account. Platform-wide roles (no account) are always included.
    pub account_id: Option<AccountId>,
    pub skip: i64,
    pub limit: i64,
}

impl RoleFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            account_id: None,
            skip,
            limit,
        }
    }
}

pub struct Roles<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Roles<'c> {
    type CreateRequest = RoleCreateDBRequest;
    type UpdateRequest = RoleUpdateDBRequest;
    type Response = RoleDBResponse;
    type Id = RoleId;
    type Filter = RoleFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let role_id = Uuid::new_v4();

        let role = sqlx::query_as::<_, RoleDBResponse>(
            r#"
            INSERT INTO roles (id, account_id, name, description, permissions, is_system)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(role_id)
        .bind(request.account_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.permissions)
        .bind(request.is_system)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(role)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let role = sqlx::query_as::<_, RoleDBResponse>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(role)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<RoleId>) -> Result<std::collections::HashMap<Self::Id, RoleDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let roles = sqlx::query_as::<_, RoleDBResponse>("SELECT * FROM roles WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(roles.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let roles = sqlx::query_as::<_, RoleDBResponse>(
            r#"
            SELECT * FROM roles
            WHERE ($1::uuid IS NULL OR account_id = $1 OR account_id IS NULL)
            ORDER BY is_system DESC, name ASC LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.account_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(roles)
    }

    /// Delete a role and its assignments. System roles are protected.
    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let is_system = sqlx::query_scalar::<_, bool>("SELECT is_system FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(is_system) = is_system else {
            return Ok(false);
        };

        if is_system {
            return Err(DbError::ProtectedEntity {
                operation: Operation::Delete,
                reason: "system roles cannot be deleted".to_string(),
                entity_type: "role".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        // Assignments go with the role via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM roles WHERE id = $1").bind(id).execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let is_system = sqlx::query_scalar::<_, bool>("SELECT is_system FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        if is_system {
            return Err(DbError::ProtectedEntity {
                operation: Operation::Update,
                reason: "system roles are read-only".to_string(),
                entity_type: "role".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let role = sqlx::query_as::<_, RoleDBResponse>(
            r#"
            UPDATE roles SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                permissions = COALESCE($4, permissions),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.permissions)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(role)
    }
}

impl<'c> Roles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up a role by name within an account scope. `None` scope means platform-wide.
    #[instrument(skip(self, name), err)]
    pub async fn get_by_name(&mut self, account_id: Option<AccountId>, name: &str) -> Result<Option<RoleDBResponse>> {
        let role = sqlx::query_as::<_, RoleDBResponse>(
            r#"
            SELECT * FROM roles
            WHERE name = $2 AND (($1::uuid IS NULL AND account_id IS NULL) OR account_id = $1)
            "#,
        )
        .bind(account_id)
        .bind(name)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(role)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&role_id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn assign_to_user(&mut self, role_id: RoleId, user_id: UserId) -> Result<()> {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&role_id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn remove_from_user(&mut self, role_id: RoleId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn roles_for_user(&mut self, user_id: UserId) -> Result<Vec<RoleDBResponse>> {
        let roles = sqlx::query_as::<_, RoleDBResponse>(
            r#"
            SELECT r.* FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(roles)
    }

    /// The union of permission strings across all of a user's roles.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn permissions_for_user(&mut self, user_id: UserId) -> Result<Vec<String>> {
        let permissions = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT unnest(r.permissions) AS permission FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY permission
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(permissions)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &RoleFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM roles WHERE ($1::uuid IS NULL OR account_id = $1 OR account_id IS NULL)",
        )
        .bind(filter.account_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}
