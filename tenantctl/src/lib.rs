//! # tenantctl: Multi-Tenant SaaS Administration
//!
//! `tenantctl` is the administration backend for a multi-tenant SaaS platform. It manages
//! tenant accounts and the users inside them, role-based permissions, per-user API keys,
//! audit trails with synchronous export, uploaded media, and outbound webhooks, all behind
//! a RESTful management API.
//!
//! ## Overview
//!
//! Organizations running a multi-tenant product need one place where platform operators
//! and account administrators can provision tenants, manage memberships and permissions,
//! issue programmatic credentials, and answer "who changed what, and when". This crate is
//! that place: a single binary that serves the management API, records an audit entry for
//! every mutation, and notifies external systems of changes through signed webhooks.
//!
//! ### What It Does
//!
//! At its core, `tenantctl` receives management requests, authenticates the caller via
//! session cookie or API key, authorizes the operation against the caller's role-derived
//! permissions, and executes it through repository interfaces backed by PostgreSQL.
//! Mutations write their audit log entry in the same transaction as the change itself,
//! and domain events (account suspended, user deleted, webhook delivery failed upstream)
//! are queued for webhook delivery inside that transaction too, so the mutation and its
//! outbound notification can never disagree.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP
//! layer and uses PostgreSQL for all persistence.
//!
//! ### Request Flow
//!
//! Requests to `/admin/api/v1/*` follow a traditional web application flow. An extractor
//! authenticates the caller, trying API keys first (`Authorization: Bearer ak-...`) and
//! session cookies second. Once authenticated, the handler performs authorization checks
//! against the caller's permissions and account, then interacts with the database through
//! repositories. A middleware around the admin API records a usage row for every
//! API-key-authenticated request, which feeds the per-key request log endpoint.
//!
//! Authentication endpoints (`/authentication/*`) live at the root, outside the
//! versioned admin prefix, so they can be masked when deployed behind an SSO proxy.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) exposes the management API: accounts, users, roles, API
//! keys, audit logs and exports, media, and webhook configuration. The **authentication
//! layer** ([`auth`]) issues JWT session cookies, verifies Argon2 password hashes, and
//! evaluates role-derived permissions. The **database layer** ([`db`]) uses the
//! repository pattern; each entity has a repository that owns its queries. The
//! **webhooks layer** ([`webhooks`]) turns committed domain events into signed HTTP
//! deliveries with retries and exponential backoff.
//!
//! **Background services** run alongside the HTTP server: the webhook dispatcher
//! periodically claims queued deliveries in batches and sends them concurrently.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use tenantctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Parse CLI arguments and load configuration
//!     let args = tenantctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     // Initialize telemetry (structured logging and optional OpenTelemetry)
//!     tenantctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     // Create and start the application
//!     let app = Application::new(config).await?;
//!
//!     // Run with graceful shutdown on Ctrl+C
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and automatically runs migrations on
//! startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! // Run migrations
//! tenantctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
mod openapi;
mod request_logging;
mod static_assets;
pub mod telemetry;
mod types;
pub mod webhooks;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::models::{accounts::AccountCreate, users::UserStatus},
    auth::password,
    db::handlers::{Accounts, Repository, Roles, Users},
    db::models::{
        accounts::AccountCreateDBRequest,
        roles::RoleCreateDBRequest,
        users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    openapi::ApiDoc,
    types::{Access, Permission, Resource},
};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderValue;
use axum::{
    Json, Router, http,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{AccountId, ApiKeyId, MediaId, RoleId, UserId, WebhookId};

/// Application state shared across all request handlers.
///
/// Cheap to clone; the pool is internally reference counted.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the tenantctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial platform operator if it doesn't exist.
///
/// This function is idempotent: it creates the operator's home account and user on
/// first boot, or updates the password of the existing user on subsequent boots when
/// one is configured. It is called during application startup so that a fresh
/// deployment always has a way to log in.
///
/// # Arguments
///
/// - `email`: Email address for the operator (also used as username)
/// - `password`: Optional password. If `None`, the user will have no password set
/// - `account_name`: Name of the home account created on first boot
/// - `db`: PostgreSQL connection pool
///
/// # Returns
///
/// Returns the user ID of the created or existing operator.
#[instrument(skip_all)]
pub async fn create_initial_admin(
    email: &str,
    password: Option<&str>,
    account_name: &str,
    db: &PgPool,
) -> anyhow::Result<UserId> {
    let password_hash = password
        .map(password::hash_password)
        .transpose()
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;

    let mut tx = db.begin().await?;

    if let Some(existing) = Users::new(&mut tx).get_user_by_email(email).await? {
        if password_hash.is_some() {
            Users::new(&mut tx)
                .update(
                    existing.id,
                    &UserUpdateDBRequest {
                        password_hash,
                        ..Default::default()
                    },
                )
                .await?;
        }
        tx.commit().await?;
        return Ok(existing.id);
    }

    info!("Creating initial platform operator {email}");

    let account_request = AccountCreateDBRequest::from(AccountCreate {
        name: account_name.to_string(),
        slug: None,
        plan: None,
        contact_email: None,
        settings: None,
    });

    // The home account may survive a deleted operator user; reuse it by slug
    let account = match Accounts::new(&mut tx).get_by_slug(&account_request.slug).await? {
        Some(account) => account,
        None => Accounts::new(&mut tx).create(&account_request).await?,
    };

    let user = Users::new(&mut tx)
        .create(&UserCreateDBRequest {
            account_id: account.id,
            username: email.to_string(),
            email: email.to_string(),
            display_name: None,
            status: UserStatus::Active,
            is_admin: true,
            password_hash,
        })
        .await?;

    tx.commit().await?;
    Ok(user.id)
}

/// Seed the platform-wide system roles (run on every boot, idempotent).
///
/// Two roles are maintained: `account-admin` grants write access to every resource,
/// `auditor` grants read-only access. Both are platform-wide (`account_id IS NULL`)
/// and flagged as system roles so they cannot be modified or deleted through the API.
#[instrument(skip_all)]
pub async fn seed_system_roles(db: &PgPool) -> anyhow::Result<()> {
    let definitions = [
        ("account-admin", "Full access to every resource in the account", Access::Write),
        ("auditor", "Read-only access to every resource in the account", Access::Read),
    ];

    let mut tx = db.begin().await?;

    for (name, description, access) in definitions {
        let mut roles = Roles::new(&mut tx);
        if roles.get_by_name(None, name).await?.is_some() {
            continue;
        }

        let permissions = Resource::ALL
            .iter()
            .map(|resource| Permission::new(*resource, access).to_string())
            .collect();

        roles
            .create(&RoleCreateDBRequest {
                account_id: None,
                name: name.to_string(),
                description: Some(description.to_string()),
                permissions,
                is_system: true,
            })
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Run migrations and seed required rows (system roles, initial operator).
async fn initialize_database(config: &Config, pool: &PgPool) -> anyhow::Result<()> {
    migrator().run(pool).await?;

    seed_system_roles(pool).await?;

    create_initial_admin(
        &config.admin_email,
        config.admin_password.as_deref(),
        &config.admin_account_name,
        pool,
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;

    Ok(())
}

/// Connect to the configured database, run migrations, and initialize data
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.pool.max_connections)
        .min_connections(config.database.pool.min_connections)
        .acquire_timeout(config.database.pool.acquire_timeout)
        .connect(&config.database.url)
        .await?;

    initialize_database(config, &pool).await?;

    Ok(pool)
}

/// Health check that verifies database reachability.
///
/// Returns 503 when the database cannot be queried, so load balancers stop
/// routing to an instance that lost its pool.
async fn healthz(State(state): State<AppState>) -> errors::Result<&'static str> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .map_err(|e| errors::Error::ServiceUnavailable { reason: e.to_string() })?;

    Ok("OK")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let origins = &config.auth.cors.allowed_origins;

    // Wildcard origins cannot be combined with credentials
    if origins.iter().any(|origin| origin == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
            .expose_headers(vec![http::header::LOCATION]));
    }

    let mut parsed = Vec::with_capacity(origins.len());
    for origin in origins {
        parsed.push(origin.parse::<HeaderValue>()?);
    }

    Ok(CorsLayer::new()
        .allow_origin(parsed)
        .allow_credentials(true)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .expose_headers(vec![http::header::LOCATION]))
}

/// Build the main application router with all endpoints and middleware.
///
/// This function constructs the complete Axum router with:
/// - Authentication routes (login, logout, current user)
/// - Admin API routes (account/user/role/API key/audit/media/webhook management)
/// - API key usage accounting middleware around the admin API
/// - OpenAPI document and Scalar console
/// - Static asset serving with SPA fallback
/// - Optional Prometheus metrics
/// - CORS configuration
/// - Tracing middleware
///
/// # Errors
///
/// Returns an error if a configured CORS origin is not a valid header value.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    // Authentication routes (at root level, can be masked when deployed behind SSO proxy)
    let auth_routes = Router::new()
        .route("/authentication/login", post(api::handlers::auth::login))
        .route("/authentication/logout", post(api::handlers::auth::logout))
        .route("/authentication/me", get(api::handlers::auth::get_current_user))
        .with_state(state.clone());

    // Media upload gets a body limit sized from config; 64 KiB headroom covers the
    // multipart framing around the file bytes
    let media_upload = Router::new().route(
        "/accounts/{account_id}/media",
        post(api::handlers::media::upload_media)
            .layer(DefaultBodyLimit::max(state.config.media.max_upload_bytes + 64 * 1024)),
    );

    // API routes
    let api_routes = Router::new()
        // Account management (platform operators only)
        .route("/accounts", post(api::handlers::accounts::create_account))
        .route("/accounts", get(api::handlers::accounts::list_accounts))
        .route("/accounts/{account_id}", get(api::handlers::accounts::get_account))
        .route("/accounts/{account_id}", patch(api::handlers::accounts::update_account))
        .route("/accounts/{account_id}", delete(api::handlers::accounts::delete_account))
        .route("/accounts/{account_id}/suspend", post(api::handlers::accounts::suspend_account))
        .route(
            "/accounts/{account_id}/reactivate",
            post(api::handlers::accounts::reactivate_account),
        )
        // Users as account sub-resources
        .route("/accounts/{account_id}/users", post(api::handlers::users::create_user))
        .route("/accounts/{account_id}/users", get(api::handlers::users::list_users))
        .route("/users/{user_id}", get(api::handlers::users::get_user))
        .route("/users/{user_id}", patch(api::handlers::users::update_user))
        .route("/users/{user_id}", delete(api::handlers::users::delete_user))
        // Role assignments
        .route("/users/{user_id}/roles", get(api::handlers::users::list_user_roles))
        .route("/users/{user_id}/roles/{role_id}", put(api::handlers::users::assign_role))
        .route("/users/{user_id}/roles/{role_id}", delete(api::handlers::users::remove_role))
        // Role definitions
        .route("/accounts/{account_id}/roles", post(api::handlers::roles::create_role))
        .route("/accounts/{account_id}/roles", get(api::handlers::roles::list_roles))
        .route("/roles/{role_id}", get(api::handlers::roles::get_role))
        .route("/roles/{role_id}", patch(api::handlers::roles::update_role))
        .route("/roles/{role_id}", delete(api::handlers::roles::delete_role))
        // API keys as user sub-resources
        .route("/users/{user_id}/api-keys", post(api::handlers::api_keys::create_user_api_key))
        .route("/users/{user_id}/api-keys", get(api::handlers::api_keys::list_user_api_keys))
        .route("/users/{user_id}/api-keys/{id}", get(api::handlers::api_keys::get_user_api_key))
        .route(
            "/users/{user_id}/api-keys/{id}",
            delete(api::handlers::api_keys::delete_user_api_key),
        )
        .route(
            "/api-keys/{api_key_id}/requests",
            get(api::handlers::api_keys::list_api_key_requests),
        )
        // Audit trail and synchronous exports
        .route("/accounts/{account_id}/audit-logs", get(api::handlers::audit::list_audit_logs))
        .route(
            "/accounts/{account_id}/audit-exports",
            post(api::handlers::audit::create_audit_export),
        )
        .route(
            "/accounts/{account_id}/audit-exports",
            get(api::handlers::audit::list_audit_exports),
        )
        .route("/audit-exports/{id}", get(api::handlers::audit::get_audit_export))
        .route("/audit-exports/{id}/download", get(api::handlers::audit::download_audit_export))
        // Media - merge upload route with custom body limit
        .merge(media_upload)
        .route("/accounts/{account_id}/media", get(api::handlers::media::list_media))
        .route("/media/{id}", get(api::handlers::media::get_media))
        .route("/media/{id}/download", get(api::handlers::media::download_media))
        .route("/media/{id}", delete(api::handlers::media::delete_media))
        // Webhook configuration and delivery history
        .route("/accounts/{account_id}/webhooks", post(api::handlers::webhooks::create_webhook))
        .route("/accounts/{account_id}/webhooks", get(api::handlers::webhooks::list_webhooks))
        .route("/webhooks/{id}", get(api::handlers::webhooks::get_webhook))
        .route("/webhooks/{id}", patch(api::handlers::webhooks::update_webhook))
        .route("/webhooks/{id}", delete(api::handlers::webhooks::delete_webhook))
        .route("/webhooks/{id}/rotate-secret", post(api::handlers::webhooks::rotate_webhook_secret))
        .route("/webhooks/{id}/deliveries", get(api::handlers::webhooks::list_webhook_deliveries));

    // Usage accounting wraps the whole admin surface
    let api_routes = api_routes
        .layer(from_fn_with_state(state.clone(), request_logging::record_api_key_usage))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state.clone())
        .merge(auth_routes)
        .nest("/admin/api/v1", api_routes)
        .merge(Scalar::with_url("/admin/docs", ApiDoc::openapi()))
        .fallback(api::handlers::static_assets::serve_embedded_asset);

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    // Add Prometheus metrics if enabled
    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Container for background services and their lifecycle management.
///
/// Currently this holds the webhook dispatcher loop. The struct provides a
/// [`shutdown`](BackgroundServices::shutdown) method to gracefully stop all
/// background tasks; when dropped, the `drop_guard` cancels the shutdown token
/// so tasks stop even if `shutdown` was never called.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        // Signal all background tasks to shutdown
        self.shutdown_token.cancel();

        // Wait for all background tasks to complete
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Setup background services (webhook dispatcher)
fn setup_background_services(pool: &PgPool, config: &Config, shutdown_token: CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    let mut dispatcher = webhooks::WebhookDispatcher::spawn(pool.clone(), &config.webhooks, shutdown_token.clone());
    let dispatch_interval = config.webhooks.dispatch_interval;
    let dispatcher_shutdown = shutdown_token.clone();
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(dispatch_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => dispatcher.tick().await,
                _ = dispatcher_shutdown.cancelled() => {
                    info!("Webhook dispatcher shutting down");
                    break;
                }
            }
        }
    });
    background_tasks.push(handle);

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations,
///    seeds system roles and the initial operator, and starts background services
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown signal resolves, gracefully stops all services
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application on an existing pool.
    ///
    /// Used by tests to share the per-test database; runs the same migrations and
    /// seeding as [`Application::new`].
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting tenantctl with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => {
                initialize_database(&config, &pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        // Create a shutdown token for coordinating graceful shutdown of background tasks
        let shutdown_token = CancellationToken::new();
        let bg_services = setup_background_services(&pool, &config, shutdown_token);

        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "tenantctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Shutdown background services and wait for tasks to complete
        self.bg_services.shutdown().await;

        // Close database connections
        info!("Closing database connections...");
        self.pool.close().await;

        // Shutdown telemetry
        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
