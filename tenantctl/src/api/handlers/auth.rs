use axum::{extract::State, Json};

use crate::{
    api::models::{
        auth::{AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::{current_user, password, session},
    db::handlers::{Repository, Users},
    errors::Error,
    AppState,
};

/// Login with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "User or account is suspended"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Find user by email
    let user = Users::new(&mut pool_conn)
        .get_user_by_email(&request.email)
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Invalid email or password".to_string()),
        })?;

    // Invited users have no password yet and cannot log in
    let password_hash = user.password_hash.as_ref().ok_or_else(|| Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    })?;

    // Verify password on a blocking thread to avoid blocking async runtime
    let password = request.password.clone();
    let hash = password_hash.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(Error::Unauthenticated {
            message: Some("Invalid email or password".to_string()),
        });
    }

    // Run the same status and account checks as authenticated requests, so a
    // suspended principal cannot mint a fresh session.
    current_user::load_current_user(&mut pool_conn, user.id).await?;

    Users::new(&mut pool_conn).record_login(user.id).await?;

    // Create session token
    let token = session::create_session_token(&user, &state.config)?;

    // Set session cookie
    let cookie = create_session_cookie(&token, &state.config);

    let auth_response = AuthResponse {
        user: UserResponse::from(user),
        message: "Login successful".to_string(),
    };

    Ok(LoginResponse { auth_response, cookie })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    // Create expired cookie to clear session
    let cookie = format!(
        "{}=; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=0",
        state.config.auth.session_cookie_name
    );

    let auth_response = AuthSuccessResponse {
        message: "Logout successful".to_string(),
    };

    Ok(LogoutResponse { auth_response, cookie })
}

/// Get the currently authenticated user
#[utoipa::path(
    get,
    path = "/authentication/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>, Error> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Re-read so the response carries roles and timestamps, not just the
    // authenticated identity.
    let user = Users::new(&mut pool_conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    Ok(Json(UserResponse::from(user)))
}

/// Helper function to create a session cookie
fn create_session_cookie(token: &str, config: &crate::config::Config) -> String {
    let max_age = config.auth.jwt_expiry.as_secs();

    format!(
        "{}={}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={}",
        config.auth.session_cookie_name, token, max_age
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::{accounts::AccountStatus, users::UserStatus},
        db::{
            handlers::Accounts,
            models::{
                accounts::{AccountCreateDBRequest, AccountDBResponse},
                users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
            },
        },
        test_utils::create_test_config,
        types::AccountId,
    };
    use axum_test::TestServer;
    use sqlx::PgPool;

    fn test_server(pool: &PgPool) -> TestServer {
        let state = AppState::builder().db(pool.clone()).config(create_test_config()).build();

        let app = axum::Router::new()
            .route("/authentication/login", axum::routing::post(login))
            .route("/authentication/logout", axum::routing::post(logout))
            .route("/authentication/me", axum::routing::get(get_current_user))
            .with_state(state);

        TestServer::new(app).unwrap()
    }

    async fn seed_account(pool: &PgPool, slug: &str) -> AccountDBResponse {
        let mut conn = pool.acquire().await.unwrap();
        Accounts::new(&mut conn)
            .create(&AccountCreateDBRequest {
                name: slug.to_string(),
                slug: slug.to_string(),
                plan: "free".to_string(),
                contact_email: None,
                settings: serde_json::json!({}),
            })
            .await
            .unwrap()
    }

    async fn seed_user_with_password(pool: &PgPool, account_id: AccountId, username: &str, password: &str) -> UserDBResponse {
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                account_id,
                username: username.to_string(),
                email: format!("{username}@example.com"),
                display_name: None,
                status: UserStatus::Active,
                is_admin: false,
                password_hash: Some(password::hash_password(password).unwrap()),
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_success(pool: PgPool) {
        let account = seed_account(&pool, "acme").await;
        let user = seed_user_with_password(&pool, account.id, "alice", "password123").await;
        let server = test_server(&pool);

        let response = server
            .post("/authentication/login")
            .json(&LoginRequest {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;

        response.assert_status_ok();
        let set_cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
        assert!(set_cookie.starts_with("tenantctl_session="));
        assert!(set_cookie.contains("HttpOnly"));

        let body: AuthResponse = response.json();
        assert_eq!(body.user.email, "alice@example.com");
        assert_eq!(body.message, "Login successful");

        // last_login is recorded
        let mut conn = pool.acquire().await.unwrap();
        let reloaded = Users::new(&mut conn).get_by_id(user.id).await.unwrap().unwrap();
        assert!(reloaded.last_login.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_wrong_password(pool: PgPool) {
        let account = seed_account(&pool, "acme").await;
        seed_user_with_password(&pool, account.id, "alice", "password123").await;
        let server = test_server(&pool);

        let response = server
            .post("/authentication/login")
            .json(&LoginRequest {
                email: "alice@example.com".to_string(),
                password: "not-the-password".to_string(),
            })
            .await;

        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_unknown_email(pool: PgPool) {
        let server = test_server(&pool);

        let response = server
            .post("/authentication/login")
            .json(&LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;

        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_invited_user_without_password(pool: PgPool) {
        let account = seed_account(&pool, "acme").await;
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                account_id: account.id,
                username: "invitee".to_string(),
                email: "invitee@example.com".to_string(),
                display_name: None,
                status: UserStatus::Invited,
                is_admin: false,
                password_hash: None,
            })
            .await
            .unwrap();
        let server = test_server(&pool);

        let response = server
            .post("/authentication/login")
            .json(&LoginRequest {
                email: "invitee@example.com".to_string(),
                password: "anything".to_string(),
            })
            .await;

        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_suspended_user_is_forbidden(pool: PgPool) {
        let account = seed_account(&pool, "acme").await;
        let user = seed_user_with_password(&pool, account.id, "alice", "password123").await;

        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .update(
                user.id,
                &UserUpdateDBRequest {
                    status: Some(UserStatus::Suspended),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let server = test_server(&pool);
        let response = server
            .post("/authentication/login")
            .json(&LoginRequest {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;

        response.assert_status(axum::http::StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_suspended_account_is_forbidden(pool: PgPool) {
        let account = seed_account(&pool, "acme").await;
        seed_user_with_password(&pool, account.id, "alice", "password123").await;

        let mut conn = pool.acquire().await.unwrap();
        Accounts::new(&mut conn).set_status(account.id, AccountStatus::Suspended).await.unwrap();

        let server = test_server(&pool);
        let response = server
            .post("/authentication/login")
            .json(&LoginRequest {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;

        response.assert_status(axum::http::StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_session_cookie_authenticates_me(pool: PgPool) {
        let account = seed_account(&pool, "acme").await;
        let user = seed_user_with_password(&pool, account.id, "alice", "password123").await;
        let server = test_server(&pool);

        let login_response = server
            .post("/authentication/login")
            .json(&LoginRequest {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;
        login_response.assert_status_ok();

        let set_cookie = login_response.headers().get("set-cookie").unwrap().to_str().unwrap();
        let cookie_pair = set_cookie.split(';').next().unwrap().to_string();

        let response = server.get("/authentication/me").add_header("cookie", cookie_pair).await;
        response.assert_status_ok();

        let body: UserResponse = response.json();
        assert_eq!(body.id, user.id);
        assert_eq!(body.email, "alice@example.com");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_me_without_credentials(pool: PgPool) {
        let server = test_server(&pool);

        let response = server.get("/authentication/me").await;
        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_logout_expires_cookie(pool: PgPool) {
        let server = test_server(&pool);

        let response = server.post("/authentication/logout").await;
        response.assert_status_ok();

        let set_cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("tenantctl_session="));
        assert!(set_cookie.contains("Max-Age=0"));

        let body: AuthSuccessResponse = response.json();
        assert_eq!(body.message, "Logout successful");
    }
}
