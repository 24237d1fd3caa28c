//! Test utilities for integration testing (available with `test-utils` feature).

use std::time::Duration;

use axum_test::TestServer;
use sqlx::PgPool;

use crate::config::{Config, WebhookConfig};

/// Build the full application over an externally provided pool and convert
/// it into a test server. The returned background services handle keeps the
/// webhook dispatcher alive for the duration of the test.
pub async fn create_test_app(pool: PgPool) -> (TestServer, crate::BackgroundServices) {
    // reqwest's rustls-no-provider feature requires a process-level crypto
    // provider; main() installs it in production, tests install it here.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        admin_password: Some("test-admin-password".to_string()),
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        webhooks: WebhookConfig {
            // Tests should not wait seconds for a dispatch tick
            dispatch_interval: Duration::from_millis(100),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        },
        enable_metrics: false,
        enable_otel_export: false,
        ..Default::default()
    };
    config.database.pool.max_connections = 2;
    config
}
