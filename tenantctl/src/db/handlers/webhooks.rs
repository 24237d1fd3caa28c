//! Database repository for webhook configuration and delivery tracking.

use chrono::{Duration, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::Result;
use crate::db::models::webhooks::{
    ClaimedDelivery, DeliveryStatus, Webhook, WebhookCreateDBRequest, WebhookDelivery, WebhookDeliveryCreateDBRequest,
    WebhookUpdateDBRequest,
};
use crate::types::{AccountId, DeliveryId, WebhookId, abbrev_uuid};

/// Retry schedule in seconds: 0s → 5s → 5m → 30m → 2h → 8h → 24h
const RETRY_DELAYS_SECS: &[i64] = &[
    0,     // Attempt 1: immediate
    5,     // Attempt 2: 5 seconds
    300,   // Attempt 3: 5 minutes
    1800,  // Attempt 4: 30 minutes
    7200,  // Attempt 5: 2 hours
    28800, // Attempt 6: 8 hours
    86400, // Attempt 7: 24 hours
];

/// Maximum number of delivery attempts.
pub const MAX_RETRY_ATTEMPTS: i32 = RETRY_DELAYS_SECS.len() as i32;

/// Circuit breaker threshold for consecutive failures.
pub const CIRCUIT_BREAKER_THRESHOLD: i32 = 10;

/// How long a claimed delivery stays invisible to other claimers. Bounds the
/// redelivery delay if the process dies mid-send.
const CLAIM_VISIBILITY_TIMEOUT_SECS: i64 = 300;

/// Repository for webhook operations.
pub struct Webhooks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Webhooks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a new webhook for an account.
    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&request.account_id)), err)]
    pub async fn create(&mut self, request: &WebhookCreateDBRequest) -> Result<Webhook> {
        let webhook = sqlx::query_as::<_, Webhook>(
            r#"
            INSERT INTO webhooks (id, account_id, url, secret, events, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.account_id)
        .bind(&request.url)
        .bind(&request.secret)
        .bind(&request.events)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(webhook)
    }

    /// Get a webhook by ID.
    #[instrument(skip(self), fields(webhook_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: WebhookId) -> Result<Option<Webhook>> {
        let webhook = sqlx::query_as::<_, Webhook>("SELECT * FROM webhooks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(webhook)
    }

    /// List webhooks for an account.
    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&account_id)), err)]
    pub async fn list_by_account(&mut self, account_id: AccountId) -> Result<Vec<Webhook>> {
        let webhooks = sqlx::query_as::<_, Webhook>(
            r#"
            SELECT * FROM webhooks
            WHERE account_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(webhooks)
    }

    /// Update a webhook.
    #[instrument(skip(self, request), fields(webhook_id = %abbrev_uuid(&id)), err)]
    pub async fn update(&mut self, id: WebhookId, request: &WebhookUpdateDBRequest) -> Result<Option<Webhook>> {
        let webhook = sqlx::query_as::<_, Webhook>(
            r#"
            UPDATE webhooks
            SET
                url = COALESCE($2, url),
                enabled = COALESCE($3, enabled),
                events = CASE
                    WHEN $4::boolean THEN $5
                    ELSE events
                END,
                description = CASE
                    WHEN $6::boolean THEN $7
                    ELSE description
                END,
                -- Clear disabled_at when re-enabling
                disabled_at = CASE
                    WHEN $3 = true THEN NULL
                    ELSE disabled_at
                END,
                -- Reset consecutive failures when re-enabling
                consecutive_failures = CASE
                    WHEN $3 = true THEN 0
                    ELSE consecutive_failures
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.url)
        .bind(request.enabled)
        .bind(request.events.is_some())
        .bind(&request.events)
        .bind(request.description.is_some())
        .bind(request.description.clone().flatten())
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(webhook)
    }

    /// Delete a webhook and its delivery history.
    #[instrument(skip(self), fields(webhook_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: WebhookId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rotate a webhook's secret.
    #[instrument(skip(self, new_secret), fields(webhook_id = %abbrev_uuid(&id)), err)]
    pub async fn rotate_secret(&mut self, id: WebhookId, new_secret: String) -> Result<Option<Webhook>> {
        let webhook = sqlx::query_as::<_, Webhook>(
            r#"
            UPDATE webhooks
            SET secret = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_secret)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(webhook)
    }

    /// Get enabled webhooks for an account that accept a specific event type.
    ///
    /// An empty subscription list means the webhook takes every event.
    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&account_id)), err)]
    pub async fn get_enabled_webhooks_for_event(&mut self, account_id: AccountId, event_type: &str) -> Result<Vec<Webhook>> {
        let webhooks = sqlx::query_as::<_, Webhook>(
            r#"
            SELECT * FROM webhooks
            WHERE account_id = $1
              AND enabled = true
              AND disabled_at IS NULL
              AND (
                  cardinality(events) = 0
                  OR $2 = ANY(events)
              )
            "#,
        )
        .bind(account_id)
        .bind(event_type)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(webhooks)
    }

    /// Increment consecutive failures and potentially trip circuit breaker.
    ///
    /// Returns `None` if the webhook was deleted while a delivery was in flight.
    #[instrument(skip(self), fields(webhook_id = %abbrev_uuid(&id)), err)]
    pub async fn increment_failures(&mut self, id: WebhookId) -> Result<Option<Webhook>> {
        let webhook = sqlx::query_as::<_, Webhook>(
            r#"
            UPDATE webhooks
            SET
                consecutive_failures = consecutive_failures + 1,
                enabled = CASE
                    WHEN consecutive_failures + 1 >= $2 THEN false
                    ELSE enabled
                END,
                disabled_at = CASE
                    WHEN consecutive_failures + 1 >= $2 THEN now()
                    ELSE disabled_at
                END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(CIRCUIT_BREAKER_THRESHOLD)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(webhook)
    }

    /// Reset consecutive failures on successful delivery.
    #[instrument(skip(self), fields(webhook_id = %abbrev_uuid(&id)), err)]
    pub async fn reset_failures(&mut self, id: WebhookId) -> Result<()> {
        sqlx::query("UPDATE webhooks SET consecutive_failures = 0 WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    // ===== Delivery methods =====

    /// Create a new delivery record.
    #[instrument(skip(self, request), fields(webhook_id = %abbrev_uuid(&request.webhook_id)), err)]
    pub async fn create_delivery(&mut self, request: &WebhookDeliveryCreateDBRequest) -> Result<WebhookDelivery> {
        let delivery = sqlx::query_as::<_, WebhookDelivery>(
            r#"
            INSERT INTO webhook_deliveries (id, webhook_id, event_id, event_type, payload)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.webhook_id)
        .bind(request.event_id)
        .bind(&request.event_type)
        .bind(&request.payload)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(delivery)
    }

    /// Claim retriable deliveries for sending.
    ///
    /// Due rows are locked with SKIP LOCKED so concurrent dispatchers never
    /// claim the same delivery, and their `next_attempt_at` is pushed out so a
    /// crashed dispatcher only delays redelivery instead of losing it. The
    /// webhook is LEFT JOINed because it can be deleted or disabled while the
    /// delivery sits in the queue.
    #[instrument(skip(self), err)]
    pub async fn claim_retriable_deliveries(&mut self, limit: i64) -> Result<Vec<ClaimedDelivery>> {
        let claimed = sqlx::query_as::<_, ClaimedDelivery>(
            r#"
            WITH due AS (
                SELECT id FROM webhook_deliveries
                WHERE status IN ('pending', 'failed')
                  AND next_attempt_at <= now()
                ORDER BY next_attempt_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            ),
            bumped AS (
                UPDATE webhook_deliveries d
                SET next_attempt_at = now() + make_interval(secs => $2)
                FROM due
                WHERE d.id = due.id
                RETURNING d.id, d.webhook_id, d.event_id, d.event_type, d.payload, d.attempt_count
            )
            SELECT
                b.id, b.webhook_id, b.event_id, b.event_type, b.payload, b.attempt_count,
                w.url AS webhook_url,
                w.secret AS webhook_secret,
                w.enabled AS webhook_enabled
            FROM bumped b
            LEFT JOIN webhooks w ON w.id = b.webhook_id
            "#,
        )
        .bind(limit)
        .bind(CLAIM_VISIBILITY_TIMEOUT_SECS as f64)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(claimed)
    }

    /// Mark a delivery as successful.
    #[instrument(skip(self), fields(delivery_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_delivered(&mut self, id: DeliveryId, status_code: i32) -> Result<WebhookDelivery> {
        let delivery = sqlx::query_as::<_, WebhookDelivery>(
            r#"
            UPDATE webhook_deliveries
            SET
                status = 'delivered',
                attempt_count = attempt_count + 1,
                last_status_code = $2,
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status_code)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(delivery)
    }

    /// Mark a delivery as failed and schedule retry.
    #[instrument(skip(self, error), fields(delivery_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_failed(
        &mut self,
        id: DeliveryId,
        status_code: Option<i32>,
        error: &str,
        current_attempt: i32,
    ) -> Result<WebhookDelivery> {
        let new_attempt = current_attempt + 1;

        // Determine next status and retry time
        let (new_status, next_attempt_at) = if new_attempt >= MAX_RETRY_ATTEMPTS {
            (DeliveryStatus::Exhausted.as_str(), Utc::now())
        } else {
            let delay_secs = RETRY_DELAYS_SECS.get(new_attempt as usize).copied().unwrap_or(86400);
            let next = Utc::now() + Duration::seconds(delay_secs);
            (DeliveryStatus::Failed.as_str(), next)
        };

        let delivery = sqlx::query_as::<_, WebhookDelivery>(
            r#"
            UPDATE webhook_deliveries
            SET
                status = $2,
                attempt_count = $3,
                next_attempt_at = $4,
                last_status_code = $5,
                last_error = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_status)
        .bind(new_attempt)
        .bind(next_attempt_at)
        .bind(status_code)
        .bind(error)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(delivery)
    }

    /// Retire a delivery whose webhook is gone or disabled.
    #[instrument(skip(self, reason), fields(delivery_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_exhausted(&mut self, id: DeliveryId, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = 'exhausted', last_error = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Get a delivery by ID.
    #[instrument(skip(self), fields(delivery_id = %abbrev_uuid(&id)), err)]
    pub async fn get_delivery_by_id(&mut self, id: DeliveryId) -> Result<Option<WebhookDelivery>> {
        let delivery = sqlx::query_as::<_, WebhookDelivery>("SELECT * FROM webhook_deliveries WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(delivery)
    }

    /// List deliveries for a webhook, newest first.
    #[instrument(skip(self), fields(webhook_id = %abbrev_uuid(&webhook_id)), err)]
    pub async fn list_deliveries(
        &mut self,
        webhook_id: WebhookId,
        status: Option<DeliveryStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>> {
        let deliveries = sqlx::query_as::<_, WebhookDelivery>(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE webhook_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC LIMIT $3 OFFSET $4
            "#,
        )
        .bind(webhook_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(deliveries)
    }

    #[instrument(skip(self), fields(webhook_id = %abbrev_uuid(&webhook_id)), err)]
    pub async fn count_deliveries(&mut self, webhook_id: WebhookId, status: Option<DeliveryStatus>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM webhook_deliveries WHERE webhook_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(webhook_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}
