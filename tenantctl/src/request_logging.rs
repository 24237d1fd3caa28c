//! Usage accounting for API-key-authenticated requests.
//!
//! Runs as middleware around the admin API routes. When a request carries an
//! `Authorization: Bearer ak-...` header, one `api_requests` row is written
//! after the handler completes, capturing method, path, response status and
//! latency, and the key's `last_used_at` timestamp is bumped. Requests whose
//! key is unknown, revoked or expired are not recorded: the auth extractor
//! already rejected them before any handler ran.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{instrument, warn};

use crate::AppState;
use crate::db::handlers::{ApiKeys, ApiRequests};
use crate::db::models::requests::ApiRequestCreateDBRequest;

/// Record one usage row for the request if it authenticated with an API key.
///
/// The key is resolved from the bearer secret a second time here, after the
/// response is ready. A failure to record is logged and swallowed; it never
/// fails the request itself.
#[instrument(skip_all, fields(path = %request.uri().path(), method = %request.method()))]
pub async fn record_api_key_usage(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let secret = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| token.starts_with("ak-"));

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    if let Some(secret) = secret {
        let status_code = response.status().as_u16() as i32;
        let duration_ms = started.elapsed().as_millis() as i64;

        if let Err(error) = record_usage(&state, &secret, method, path, status_code, duration_ms).await {
            warn!("Failed to record API key usage: {error}");
        }
    }

    response
}

async fn record_usage(
    state: &AppState,
    secret: &str,
    method: String,
    path: String,
    status_code: i32,
    duration_ms: i64,
) -> crate::db::errors::Result<()> {
    let mut conn = state.db.acquire().await?;

    let Some(key) = ApiKeys::new(&mut conn).find_by_secret(secret).await? else {
        return Ok(());
    };
    if !key.is_usable() {
        return Ok(());
    }

    ApiKeys::new(&mut conn).touch_last_used(key.id).await?;
    ApiRequests::new(&mut conn)
        .record(&ApiRequestCreateDBRequest {
            api_key_id: key.id,
            method,
            path,
            status_code,
            duration_ms,
        })
        .await?;

    Ok(())
}
