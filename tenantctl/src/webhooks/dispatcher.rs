//! Webhook delivery worker.
//!
//! Each [`WebhookDispatcher::tick`] runs one dispatch cycle. The cycle first
//! claims due deliveries (`SELECT ... FOR UPDATE SKIP LOCKED` joined against
//! the webhook config, so concurrent workers never double-send), signs each
//! payload, and hands the fully built HTTP requests to a long-lived sender
//! task over a channel. It then drains the results of previously completed
//! sends and writes their outcomes back: success marks the delivery
//! `delivered` and clears the endpoint's failure streak, failure schedules
//! the next retry (or exhausts the delivery) and bumps the streak, which
//! disables the webhook once the circuit breaker threshold is reached.
//!
//! The sender task holds the HTTP client and a semaphore capping concurrent
//! sends. It never touches the database and never sees a secret, only
//! already-signed requests. Deliveries claimed but not yet resolved when the
//! process dies become re-claimable once the crash safety window elapses.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sqlx::PgPool;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::db::handlers::Webhooks;
use crate::db::models::webhooks::ClaimedDelivery;
use crate::webhooks::signing;

/// A signed, ready-to-send HTTP request handed to the sender task.
#[derive(Debug)]
struct SignedRequest {
    url: String,
    headers: Vec<(String, String)>,
    body: String,
    delivery_id: Uuid,
    webhook_id: Uuid,
    attempt_count: i32,
}

#[derive(Debug)]
enum AttemptOutcome {
    Delivered { status_code: u16 },
    Failed { status_code: Option<u16>, error: String },
}

/// What the sender task reports back after one HTTP attempt.
#[derive(Debug)]
struct AttemptReport {
    delivery_id: Uuid,
    webhook_id: Uuid,
    attempt_count: i32,
    outcome: AttemptOutcome,
}

/// Why a claimed delivery was dropped before any HTTP attempt.
enum SkipReason {
    WebhookRemoved,
    WebhookDisabled,
    BadPayload,
    SigningFailed,
}

impl SkipReason {
    /// The `last_error` text written when the delivery is exhausted, or
    /// `None` when the delivery should stay claimable.
    fn exhaust_reason(&self) -> Option<&'static str> {
        match self {
            SkipReason::WebhookRemoved => Some("webhook removed"),
            SkipReason::WebhookDisabled => Some("webhook disabled"),
            SkipReason::BadPayload => Some("payload serialization failed"),
            // Transient (bad secret encoding would also land here); leave the
            // delivery for a later claim rather than burning it.
            SkipReason::SigningFailed => None,
        }
    }
}

/// Signs a claimed delivery into a sendable request, or says why it cannot
/// be sent. Pure function of the claimed row.
fn build_signed_request(delivery: &ClaimedDelivery) -> Result<SignedRequest, SkipReason> {
    let (Some(url), Some(secret), Some(enabled)) =
        (&delivery.webhook_url, &delivery.webhook_secret, delivery.webhook_enabled)
    else {
        return Err(SkipReason::WebhookRemoved);
    };
    if !enabled {
        return Err(SkipReason::WebhookDisabled);
    }

    let body = serde_json::to_string(&delivery.payload).map_err(|_| SkipReason::BadPayload)?;

    let msg_id = delivery.event_id.to_string();
    let timestamp = Utc::now().timestamp();
    let signature =
        signing::sign_payload(&msg_id, timestamp, &body, secret).ok_or(SkipReason::SigningFailed)?;

    Ok(SignedRequest {
        url: url.clone(),
        headers: vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("webhook-id".to_string(), msg_id),
            ("webhook-timestamp".to_string(), timestamp.to_string()),
            ("webhook-signature".to_string(), signature),
            ("webhook-version".to_string(), "1".to_string()),
        ],
        body,
        delivery_id: delivery.id,
        webhook_id: delivery.webhook_id,
        attempt_count: delivery.attempt_count,
    })
}

pub struct WebhookDispatcher {
    pool: PgPool,
    send_tx: mpsc::Sender<SignedRequest>,
    report_rx: mpsc::Receiver<AttemptReport>,
    claim_batch_size: i64,
}

impl WebhookDispatcher {
    /// Create the dispatcher and spawn its sender task.
    pub fn spawn(pool: PgPool, config: &WebhookConfig, shutdown: CancellationToken) -> Self {
        let (send_tx, send_rx) = mpsc::channel::<SignedRequest>(config.channel_capacity);
        let (report_tx, report_rx) = mpsc::channel(config.channel_capacity);

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create webhook HTTP client");

        tokio::spawn(sender_loop(send_rx, report_tx, http_client, config.max_concurrent_sends, shutdown));

        Self {
            pool,
            send_tx,
            report_rx,
            claim_batch_size: config.claim_batch_size,
        }
    }

    /// One dispatch cycle: claim and enqueue due deliveries, then record the
    /// outcomes of sends that completed since the last cycle.
    pub async fn tick(&mut self) {
        tracing::debug!("Webhook dispatcher tick");
        self.claim_due_deliveries().await;
        self.record_completed_sends().await;
    }

    async fn claim_due_deliveries(&self) {
        let mut conn = match self.pool.acquire().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to acquire connection for delivery claims");
                return;
            }
        };

        let claimed = match Webhooks::new(&mut conn).claim_retriable_deliveries(self.claim_batch_size).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to claim due deliveries");
                return;
            }
        };
        if claimed.is_empty() {
            return;
        }

        counter!("tenantctl_webhook_deliveries_claimed_total").increment(claimed.len() as u64);
        tracing::debug!(count = claimed.len(), "Claimed due deliveries");

        for delivery in claimed {
            let request = match build_signed_request(&delivery) {
                Ok(r) => r,
                Err(skip) => {
                    if let Some(reason) = skip.exhaust_reason() {
                        tracing::warn!(
                            delivery_id = %delivery.id,
                            webhook_id = %delivery.webhook_id,
                            reason,
                            "Dropping undeliverable claim"
                        );
                        let _ = Webhooks::new(&mut conn).mark_exhausted(delivery.id, reason).await;
                    } else {
                        tracing::warn!(delivery_id = %delivery.id, "Failed to sign webhook payload");
                    }
                    continue;
                }
            };

            if let Err(e) = self.send_tx.try_send(request) {
                // The claim already pushed next_attempt_at into the future,
                // so a full channel just means this delivery waits one
                // crash-safety window.
                tracing::warn!(delivery_id = %delivery.id, "Sender channel full, delivery deferred: {}", e);
            }
        }
    }

    async fn record_completed_sends(&mut self) {
        let mut conn = match self.pool.acquire().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to acquire connection for send reports");
                return;
            }
        };

        let mut drained = 0u32;
        while let Ok(report) = self.report_rx.try_recv() {
            drained += 1;
            // The delivery or webhook may have been deleted while the send
            // was in-flight; the UPDATEs below then affect 0 rows, which is
            // the right thing.
            match report.outcome {
                AttemptOutcome::Delivered { status_code } => {
                    record_success(&mut Webhooks::new(&mut conn), &report, status_code).await;
                }
                AttemptOutcome::Failed { status_code, ref error } => {
                    record_failure(&mut Webhooks::new(&mut conn), &report, status_code, error).await;
                }
            }
        }

        if drained > 0 {
            tracing::debug!(count = drained, "Recorded webhook send outcomes");
        }
    }
}

async fn record_success(repo: &mut Webhooks<'_>, report: &AttemptReport, status_code: u16) {
    counter!("tenantctl_webhook_deliveries_total", "outcome" => "success").increment(1);
    if let Err(e) = repo.mark_delivered(report.delivery_id, status_code as i32).await {
        tracing::warn!(error = %e, delivery_id = %report.delivery_id, "Failed to mark delivery as delivered");
    }
    if let Err(e) = repo.reset_failures(report.webhook_id).await {
        tracing::warn!(error = %e, webhook_id = %report.webhook_id, "Failed to reset webhook failure streak");
    }
    tracing::debug!(
        webhook_id = %report.webhook_id,
        delivery_id = %report.delivery_id,
        status = status_code,
        "Webhook delivered"
    );
}

async fn record_failure(repo: &mut Webhooks<'_>, report: &AttemptReport, status_code: Option<u16>, error: &str) {
    counter!("tenantctl_webhook_deliveries_total", "outcome" => "failure").increment(1);
    if let Err(e) = repo
        .mark_failed(report.delivery_id, status_code.map(|c| c as i32), error, report.attempt_count)
        .await
    {
        tracing::warn!(error = %e, delivery_id = %report.delivery_id, "Failed to mark delivery as failed");
    }

    match repo.increment_failures(report.webhook_id).await {
        // Webhook deleted while the send was in-flight; nothing to track.
        Ok(None) => {}
        Ok(Some(webhook)) if !webhook.enabled => {
            tracing::warn!(
                webhook_id = %report.webhook_id,
                consecutive_failures = webhook.consecutive_failures,
                "Circuit breaker disabled webhook after repeated failures"
            );
        }
        Ok(Some(_)) => {}
        Err(e) => {
            tracing::warn!(error = %e, webhook_id = %report.webhook_id, "Failed to bump webhook failure streak");
        }
    }

    tracing::warn!(
        webhook_id = %report.webhook_id,
        delivery_id = %report.delivery_id,
        status_code = ?status_code,
        error = %error,
        "Webhook delivery failed"
    );
}

/// The sender half: receives signed requests, POSTs them with bounded
/// concurrency, reports each outcome back. No DB access, no secrets.
async fn sender_loop(
    mut send_rx: mpsc::Receiver<SignedRequest>,
    report_tx: mpsc::Sender<AttemptReport>,
    http_client: reqwest::Client,
    max_concurrent_sends: usize,
    shutdown: CancellationToken,
) {
    let permits = Arc::new(Semaphore::new(max_concurrent_sends));

    loop {
        let request = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            req = send_rx.recv() => match req {
                Some(r) => r,
                None => break,
            },
        };

        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let client = http_client.clone();
        let tx = report_tx.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let report = attempt_send(&client, request).await;
            if tx.send(report).await.is_err() {
                tracing::warn!("Report channel closed, dropping webhook send outcome");
            }
        });
    }

    tracing::debug!("Webhook sender task exited");
}

async fn attempt_send(client: &reqwest::Client, request: SignedRequest) -> AttemptReport {
    tracing::debug!(
        delivery_id = %request.delivery_id,
        url = %request.url,
        attempt = request.attempt_count,
        "Sending webhook"
    );

    let mut builder = client.post(&request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }

    let outcome = match builder.body(request.body).send().await {
        Ok(response) if response.status().is_success() => AttemptOutcome::Delivered {
            status_code: response.status().as_u16(),
        },
        Ok(response) => AttemptOutcome::Failed {
            status_code: Some(response.status().as_u16()),
            error: format!("HTTP {}", response.status().as_u16()),
        },
        Err(e) => AttemptOutcome::Failed {
            status_code: None,
            error: e.to_string(),
        },
    };

    AttemptReport {
        delivery_id: request.delivery_id,
        webhook_id: request.webhook_id,
        attempt_count: request.attempt_count,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn claimed(url: Option<&str>, secret: Option<&str>, enabled: Option<bool>) -> ClaimedDelivery {
        ClaimedDelivery {
            id: Uuid::new_v4(),
            webhook_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            event_type: "user.created".to_string(),
            payload: serde_json::json!({"event": "user.created"}),
            attempt_count: 1,
            webhook_url: url.map(String::from),
            webhook_secret: secret.map(String::from),
            webhook_enabled: enabled,
        }
    }

    // A valid whsec_ secret (base64 of 24 bytes)
    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

    #[test]
    fn signs_claimed_delivery() {
        let delivery = claimed(Some("https://example.com/hook"), Some(SECRET), Some(true));
        let request = build_signed_request(&delivery).unwrap_or_else(|_| panic!("should sign"));

        assert_eq!(request.delivery_id, delivery.id);
        assert_eq!(request.attempt_count, 1);
        assert_eq!(request.body, r#"{"event":"user.created"}"#);
        let names: Vec<&str> = request.headers.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"webhook-id"));
        assert!(names.contains(&"webhook-signature"));
        assert!(names.contains(&"webhook-timestamp"));
        let (_, sig) = request.headers.iter().find(|(n, _)| n == "webhook-signature").unwrap();
        assert!(sig.starts_with("v1,"));
    }

    #[test]
    fn missing_webhook_row_is_terminal() {
        let delivery = claimed(None, None, None);
        let Err(skip) = build_signed_request(&delivery) else {
            panic!("should not sign")
        };
        assert_eq!(skip.exhaust_reason(), Some("webhook removed"));
    }

    #[test]
    fn disabled_webhook_is_terminal() {
        let delivery = claimed(Some("https://example.com/hook"), Some(SECRET), Some(false));
        let Err(skip) = build_signed_request(&delivery) else {
            panic!("should not sign")
        };
        assert_eq!(skip.exhaust_reason(), Some("webhook disabled"));
    }

    #[test]
    fn bad_secret_is_not_terminal() {
        let delivery = claimed(Some("https://example.com/hook"), Some("not-a-secret"), Some(true));
        let Err(skip) = build_signed_request(&delivery) else {
            panic!("should not sign")
        };
        assert_eq!(skip.exhaust_reason(), None);
    }

    async fn spawn_sender() -> (mpsc::Sender<SignedRequest>, mpsc::Receiver<AttemptReport>, CancellationToken) {
        // reqwest's rustls-no-provider feature requires a process-level crypto
        // provider; main() installs it in production, tests install it here.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let (send_tx, send_rx) = mpsc::channel(8);
        let (report_tx, report_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        tokio::spawn(sender_loop(
            send_rx,
            report_tx,
            reqwest::Client::new(),
            4,
            shutdown.clone(),
        ));
        (send_tx, report_rx, shutdown)
    }

    fn request_to(url: &str) -> SignedRequest {
        let delivery = claimed(Some(url), Some(SECRET), Some(true));
        build_signed_request(&delivery).unwrap_or_else(|_| panic!("should sign"))
    }

    #[tokio::test]
    async fn sender_reports_success_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists("webhook-signature"))
            .and(body_string(r#"{"event":"user.created"}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (send_tx, mut report_rx, shutdown) = spawn_sender().await;
        let request = request_to(&server.uri());
        let delivery_id = request.delivery_id;
        send_tx.send(request).await.unwrap();

        let report = report_rx.recv().await.unwrap();
        assert_eq!(report.delivery_id, delivery_id);
        assert!(matches!(report.outcome, AttemptOutcome::Delivered { status_code: 200 }));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn non_2xx_reports_failure_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let (send_tx, mut report_rx, shutdown) = spawn_sender().await;
        send_tx.send(request_to(&server.uri())).await.unwrap();

        let report = report_rx.recv().await.unwrap();
        assert!(matches!(
            report.outcome,
            AttemptOutcome::Failed { status_code: Some(503), .. }
        ));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn connection_refused_reports_failure_without_status() {
        // Nothing listens on port 1
        let (send_tx, mut report_rx, shutdown) = spawn_sender().await;
        send_tx.send(request_to("http://127.0.0.1:1")).await.unwrap();

        let report = report_rx.recv().await.unwrap();
        assert!(matches!(report.outcome, AttemptOutcome::Failed { status_code: None, .. }));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn sender_exits_when_channel_closes() {
        let (send_tx, send_rx) = mpsc::channel::<SignedRequest>(8);
        let (report_tx, _report_rx) = mpsc::channel(8);
        let handle = tokio::spawn(sender_loop(
            send_rx,
            report_tx,
            reqwest::Client::new(),
            4,
            CancellationToken::new(),
        ));

        drop(send_tx);
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("sender should exit when channel closes")
            .expect("sender should not panic");
    }
}
