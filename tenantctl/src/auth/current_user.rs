//! The [`CurrentUser`] extractor: request authentication.

use crate::{
    AppState,
    api::models::accounts::AccountStatus,
    api::models::users::{CurrentUser, UserStatus},
    auth::session,
    db::{
        errors::DbError,
        handlers::{Accounts, ApiKeys, Repository, Roles, Users},
    },
    errors::{Error, Result},
    types::{Permission, UserId},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument, trace, warn};

/// Extract session claims from the JWT cookie if present and valid
/// Returns:
/// - None: No session cookie present (or only invalid/expired ones)
/// - Some(Ok(claims)): Valid JWT found and verified
/// - Some(Err(error)): Cookie header present but unreadable
#[instrument(skip(parts, config))]
fn try_jwt_session_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<session::SessionClaims>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.session_cookie_name;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=') {
            if name == cookie_name {
                match session::verify_session_token(value, config) {
                    Ok(claims) => return Some(Ok(claims)),
                    Err(_) => {
                        // Expired or stale tokens are routine; treat them as absent
                        // so the request falls through to a clean 401
                        continue;
                    }
                }
            }
        }
    }
    None
}

/// Extract user from API key in Authorization header if present and valid
/// Returns:
/// - None: No Authorization header or not a Bearer token
/// - Some(Ok(user)): Valid API key found and user authenticated
/// - Some(Err(error)): Bearer token present but invalid, revoked or blocked
#[instrument(skip(parts, db))]
async fn try_api_key_auth(parts: &Parts, db: &PgPool) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    let secret = match auth_str.strip_prefix("Bearer ") {
        Some(key) => key,
        None => return None, // Not a Bearer token, try other auth methods
    };

    let mut conn = match db.acquire().await {
        Ok(conn) => conn,
        Err(e) => return Some(Err(DbError::from(e).into())),
    };

    let key = match ApiKeys::new(&mut conn).find_by_secret(secret).await {
        Ok(Some(key)) => key,
        Ok(None) => {
            return Some(Err(Error::Unauthenticated {
                message: Some("Invalid API key".to_string()),
            }));
        }
        Err(e) => return Some(Err(Error::Database(e))),
    };

    if !key.is_usable() {
        return Some(Err(Error::Unauthenticated {
            message: Some("API key is revoked or expired".to_string()),
        }));
    }

    Some(load_current_user(&mut conn, key.user_id).await)
}

/// Load the authenticated principal from the database.
///
/// Both auth methods end up here, so role changes, suspensions and deletions
/// take effect on the very next request. Login runs the same checks before
/// minting a session token.
pub(crate) async fn load_current_user(conn: &mut PgConnection, user_id: UserId) -> Result<CurrentUser> {
    let user = Users::new(&mut *conn)
        .get_by_id(user_id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    match user.status {
        UserStatus::Active => {}
        UserStatus::Suspended => {
            return Err(Error::Forbidden {
                message: "User is suspended".to_string(),
            });
        }
        UserStatus::Invited => {
            return Err(Error::Forbidden {
                message: "User has not activated their account".to_string(),
            });
        }
    }

    // Platform operators authenticate regardless of tenant account state;
    // everyone else is blocked while their account is not active.
    if !user.is_admin {
        let account = Accounts::new(&mut *conn)
            .get_by_id(user.account_id)
            .await?
            .ok_or_else(|| Error::Forbidden {
                message: "Account is closed".to_string(),
            })?;

        match account.status {
            AccountStatus::Active => {}
            AccountStatus::Suspended => {
                return Err(Error::Forbidden {
                    message: "Account is suspended".to_string(),
                });
            }
            AccountStatus::Closed => {
                return Err(Error::Forbidden {
                    message: "Account is closed".to_string(),
                });
            }
        }
    }

    let permission_strings = Roles::new(&mut *conn).permissions_for_user(user.id).await?;
    let mut permissions = Vec::with_capacity(permission_strings.len());
    for raw in &permission_strings {
        match raw.parse::<Permission>() {
            Ok(permission) => permissions.push(permission),
            Err(_) => warn!(permission = %raw, "Skipping malformed permission string"),
        }
    }

    Ok(CurrentUser {
        id: user.id,
        account_id: user.account_id,
        username: user.username,
        email: user.email,
        is_admin: user.is_admin,
        display_name: user.display_name,
        permissions,
    })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Each method returns Option<Result<CurrentUser>>:
        // - None means the auth method is not applicable (no credentials present)
        // - Some(Ok(user)) means successful authentication
        // - Some(Err(error)) means credentials were present but rejected
        //
        // Rejections propagate as-is rather than collapsing to 401: a revoked
        // key is a 401 but a suspended user is a 403, and the caller needs to
        // see the difference.

        // API key authentication first (most specific)
        match try_api_key_auth(parts, &state.db).await {
            Some(Ok(user)) => {
                debug!("Found API key authenticated user: {}", user.id);
                return Ok(user);
            }
            Some(Err(e)) => {
                trace!("API key authentication failed: {:?}", e);
                return Err(e);
            }
            None => {
                trace!("No API key authentication attempted");
            }
        }

        // JWT session cookie
        if let Some(result) = try_jwt_session_auth(parts, &state.config) {
            let claims = result?;
            let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            let user = load_current_user(&mut conn, claims.sub).await?;
            debug!("Found JWT session authenticated user: {}", user.id);
            return Ok(user);
        }

        trace!("No authentication credentials found in request");
        Err(Error::Unauthenticated { message: None })
    }
}
