use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::request::Parts,
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use crate::db::Profile;
use crate::error::AppError;
use crate::services::auth::{AuthService, SESSION_COOKIE};
use crate::AppState;

/// Where every failed sign-in ends up.
pub const AUTH_ERROR_PATH: &str = "/auth/error";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/confirm", get(confirm))
        .route("/error", get(auth_error))
        .route("/logout", post(logout))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Form action: start the Twitch OAuth handshake.
async fn login(State(state): State<Arc<AppState>>) -> Redirect {
    match AuthService::sign_in_with_oauth(&state) {
        Ok(url) => Redirect::to(&url),
        Err(e) => {
            tracing::error!("OAuth sign-in with {} failed: {:?}", state.identity.name(), e);
            Redirect::to(AUTH_ERROR_PATH)
        }
    }
}

/// OAuth redirect target: finish the handshake and start a session.
async fn confirm(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<ConfirmQuery>,
) -> (CookieJar, Redirect) {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::error!("OAuth error: {} - {}", error, description);
        return (jar, Redirect::to(AUTH_ERROR_PATH));
    }

    let (code, oauth_state) = match (query.code, query.state) {
        (Some(code), Some(oauth_state)) => (code, oauth_state),
        _ => {
            tracing::error!("OAuth confirm missing code or state parameter");
            return (jar, Redirect::to(AUTH_ERROR_PATH));
        }
    };

    match AuthService::complete_sign_in(&state, &code, &oauth_state).await {
        Ok((token, _profile)) => (jar.add(session_cookie(&state, token)), Redirect::to("/")),
        Err(e) => {
            tracing::error!("OAuth confirm failed: {:?}", e);
            (jar, Redirect::to(AUTH_ERROR_PATH))
        }
    }
}

async fn auth_error() -> Html<&'static str> {
    Html(
        "<!doctype html><html><head><title>Sign-in failed</title></head>\
         <body><h1>Sign-in failed</h1><p>We could not sign you in with Twitch. \
         <a href=\"/\">Back to check-ins</a></p></body></html>",
    )
}

async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    let removal = Cookie::build(SESSION_COOKIE).path("/");
    (jar.remove(removal), Redirect::to("/"))
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.server.secure_cookies())
        .max_age(time::Duration::hours(state.config.jwt.expiration_hours))
        .build()
}

// ============================================================================
// Auth Extractor
// ============================================================================

/// The signed-in profile, resolved from the session cookie or a bearer token.
pub struct AuthUser(pub Profile);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let token = match jar.get(SESSION_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => {
                let auth_header = parts
                    .headers
                    .get(http::header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        tracing::debug!("No session cookie or Authorization header");
                        AppError::Unauthorized
                    })?;

                if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
                    tracing::debug!("Authorization header doesn't start with 'Bearer '");
                    return Err(AppError::Unauthorized);
                }
                auth_header[7..].trim().to_string()
            }
        };

        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let profile = AuthService::get_profile_from_token(state, &token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to resolve session: {:?}", e);
                AppError::Unauthorized
            })?;

        Ok(AuthUser(profile))
    }
}
