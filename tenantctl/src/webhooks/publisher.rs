//! Event publication into the delivery outbox.
//!
//! Publishing happens on the caller's database connection, so when a handler
//! publishes inside a transaction the delivery rows commit or roll back with
//! the mutation itself. Nothing is sent from here; the dispatcher picks up
//! pending rows on its next tick.

use sqlx::PgConnection;
use tracing::debug;

use crate::db::errors::Result;
use crate::db::handlers::Webhooks;
use crate::db::models::webhooks::WebhookDeliveryCreateDBRequest;
use crate::types::AccountId;
use crate::webhooks::events::{WebhookEvent, WebhookEventType};

/// Queue an event for every enabled webhook of `account_id` subscribed to it.
///
/// Returns the number of deliveries created. Zero is normal: most accounts
/// have no webhooks.
pub async fn publish_event(
    db: &mut PgConnection,
    account_id: AccountId,
    event_type: WebhookEventType,
    data: serde_json::Value,
) -> Result<usize> {
    let mut repo = Webhooks::new(db);

    let webhooks = repo.get_enabled_webhooks_for_event(account_id, event_type.as_str()).await?;
    if webhooks.is_empty() {
        return Ok(0);
    }

    let event = WebhookEvent::new(event_type, account_id, data);
    let payload = serde_json::to_value(&event).map_err(anyhow::Error::from)?;

    let mut created = 0;
    for webhook in &webhooks {
        // Every endpoint's delivery carries the event's ID; retries reuse it
        // as the Standard Webhooks message ID.
        let delivery_request = WebhookDeliveryCreateDBRequest {
            webhook_id: webhook.id,
            event_id: event.id,
            event_type: event_type.to_string(),
            payload: payload.clone(),
        };
        repo.create_delivery(&delivery_request).await?;
        created += 1;
    }

    debug!(
        account_id = %account_id,
        event_type = %event_type,
        deliveries = created,
        "Queued webhook deliveries"
    );

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Accounts, Repository, Webhooks};
    use crate::db::models::accounts::AccountCreateDBRequest;
    use crate::db::models::webhooks::{DeliveryStatus, WebhookCreateDBRequest};
    use crate::webhooks::signing;
    use sqlx::PgPool;

    async fn seed_account(conn: &mut PgConnection) -> AccountId {
        let account = Accounts::new(conn)
            .create(&AccountCreateDBRequest {
                name: "Outbox Test".into(),
                slug: "outbox-test".into(),
                plan: "free".into(),
                contact_email: None,
                settings: serde_json::json!({}),
            })
            .await
            .unwrap();
        account.id
    }

    async fn seed_webhook(conn: &mut PgConnection, account_id: AccountId, events: Vec<String>) -> crate::types::WebhookId {
        let webhook = Webhooks::new(conn)
            .create(&WebhookCreateDBRequest {
                account_id,
                url: "https://example.com/hooks".into(),
                secret: signing::generate_secret(),
                events,
                description: None,
            })
            .await
            .unwrap();
        webhook.id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_publish_creates_pending_deliveries(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let account_id = seed_account(&mut conn).await;
        let catch_all = seed_webhook(&mut conn, account_id, vec![]).await;
        let scoped = seed_webhook(&mut conn, account_id, vec!["user.created".into()]).await;

        let created = publish_event(
            &mut conn,
            account_id,
            WebhookEventType::UserCreated,
            serde_json::json!({"user_id": "u-1"}),
        )
        .await
        .unwrap();
        assert_eq!(created, 2);

        let mut repo = Webhooks::new(&mut conn);
        let mut event_ids = Vec::new();
        for webhook_id in [catch_all, scoped] {
            let deliveries = repo.list_deliveries(webhook_id, None, 0, 10).await.unwrap();
            assert_eq!(deliveries.len(), 1);
            let delivery = &deliveries[0];
            assert_eq!(delivery.delivery_status(), DeliveryStatus::Pending);
            assert_eq!(delivery.event_type, "user.created");
            assert_eq!(delivery.attempt_count, 0);
            assert_eq!(delivery.payload["event"], "user.created");
            assert_eq!(delivery.payload["id"], delivery.event_id.to_string());
            assert_eq!(delivery.payload["account_id"], account_id.to_string());
            assert_eq!(delivery.payload["data"]["user_id"], "u-1");
            event_ids.push(delivery.event_id);
        }
        // Both endpoints received the same event
        assert_eq!(event_ids[0], event_ids[1]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_publish_skips_unsubscribed_and_disabled(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let account_id = seed_account(&mut conn).await;
        let scoped = seed_webhook(&mut conn, account_id, vec!["media.uploaded".into()]).await;

        let disabled = seed_webhook(&mut conn, account_id, vec![]).await;
        Webhooks::new(&mut conn)
            .update(
                disabled,
                &crate::db::models::webhooks::WebhookUpdateDBRequest {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let created = publish_event(
            &mut conn,
            account_id,
            WebhookEventType::UserCreated,
            serde_json::json!({"user_id": "u-1"}),
        )
        .await
        .unwrap();
        assert_eq!(created, 0);

        let mut repo = Webhooks::new(&mut conn);
        assert!(repo.list_deliveries(scoped, None, 0, 10).await.unwrap().is_empty());
        assert!(repo.list_deliveries(disabled, None, 0, 10).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_publish_rolls_back_with_transaction(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let account_id = seed_account(&mut conn).await;
        let webhook_id = seed_webhook(&mut conn, account_id, vec![]).await;
        drop(conn);

        // Publish inside a transaction that never commits
        {
            let mut tx = pool.begin().await.unwrap();
            let created = publish_event(
                &mut *tx,
                account_id,
                WebhookEventType::AccountUpdated,
                serde_json::json!({}),
            )
            .await
            .unwrap();
            assert_eq!(created, 1);
            tx.rollback().await.unwrap();
        }

        let mut conn = pool.acquire().await.unwrap();
        let deliveries = Webhooks::new(&mut conn).list_deliveries(webhook_id, None, 0, 10).await.unwrap();
        assert!(deliveries.is_empty(), "rolled-back publish left deliveries behind");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_publish_is_account_scoped(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let account_id = seed_account(&mut conn).await;

        let other_account = Accounts::new(&mut conn)
            .create(&AccountCreateDBRequest {
                name: "Other".into(),
                slug: "other".into(),
                plan: "free".into(),
                contact_email: None,
                settings: serde_json::json!({}),
            })
            .await
            .unwrap();
        let other_webhook = seed_webhook(&mut conn, other_account.id, vec![]).await;

        publish_event(&mut conn, account_id, WebhookEventType::RoleCreated, serde_json::json!({}))
            .await
            .unwrap();

        let deliveries = Webhooks::new(&mut conn)
            .list_deliveries(other_webhook, None, 0, 10)
            .await
            .unwrap();
        assert!(deliveries.is_empty());
    }
}
