//! Shared fixtures for unit tests: an in-memory database with the schema
//! applied, a stub identity provider and a ready-made `AppState`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::twitch::{IdentityProvider, ProviderIdentity, TokenResponse};
use crate::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret-for-unit-tests";

/// Fresh in-memory database. A single connection keeps every query on the
/// same memory-backed file.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

pub async fn insert_end_time(pool: &SqlitePool, end_time: NaiveDateTime) {
    sqlx::query("INSERT INTO end_time (end_time) VALUES (?)")
        .bind(end_time)
        .execute(pool)
        .await
        .expect("insert end_time");
}

pub async fn count_checkins(pool: &SqlitePool, profile_id: &str) -> AppResult<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM checkins WHERE profile_id = ?")
        .bind(profile_id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

/// Identity provider that never touches the network.
pub struct StubIdentity {
    pub fail_authorize: bool,
    pub identity: ProviderIdentity,
}

impl Default for StubIdentity {
    fn default() -> Self {
        Self {
            fail_authorize: false,
            identity: ProviderIdentity {
                provider_user_id: "424242".to_string(),
                username: "stub_viewer".to_string(),
                avatar_url: "https://static-cdn.jtvnw.net/stub.png".to_string(),
            },
        }
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    fn name(&self) -> &'static str {
        "twitch"
    }

    fn authorize_url(&self, state: &str, scopes: &[&str]) -> AppResult<String> {
        if self.fail_authorize {
            return Err(AppError::Config("Twitch client id is not configured".to_string()));
        }
        Ok(format!(
            "https://id.twitch.tv/oauth2/authorize?scope={}&state={}",
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(state)
        ))
    }

    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse> {
        if code == "bad-code" {
            return Err(AppError::TwitchApi("Failed to exchange code: invalid".to_string()));
        }
        Ok(TokenResponse {
            access_token: format!("access-{}", code),
            refresh_token: None,
            expires_in: 3600,
            scope: Vec::new(),
            token_type: "bearer".to_string(),
        })
    }

    async fn fetch_identity(&self, _access_token: &str) -> AppResult<ProviderIdentity> {
        Ok(self.identity.clone())
    }
}

pub async fn test_state_with(identity: StubIdentity) -> Arc<AppState> {
    let mut config = Config::default();
    config.jwt.secret = TEST_JWT_SECRET.to_string();
    config.overlay.tick_millis = 10;

    Arc::new(AppState {
        db: test_pool().await,
        config,
        identity: Arc::new(identity),
    })
}

pub async fn test_state() -> Arc<AppState> {
    test_state_with(StubIdentity::default()).await
}
