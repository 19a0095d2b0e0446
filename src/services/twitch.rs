use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, AppResult};

const TWITCH_AUTH_URL: &str = "https://id.twitch.tv/oauth2";
const TWITCH_API_URL: &str = "https://api.twitch.tv/helix";

/// Provider name recorded in logs and sign-in state.
pub const PROVIDER_NAME: &str = "twitch";

/// Scopes requested on every sign-in.
pub const REQUIRED_SCOPES: &[&str] = &["channel:read:subscriptions", "bits:read"];

// ============================================================================
// OAuth Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Vec<String>,
    pub token_type: String,
}

// ============================================================================
// User Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TwitchUsersResponse {
    pub data: Vec<TwitchUser>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub profile_image_url: Option<String>,
}

/// Who signed in, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub provider_user_id: String,
    pub username: String,
    pub avatar_url: String,
}

impl From<TwitchUser> for ProviderIdentity {
    fn from(u: TwitchUser) -> Self {
        let username = if u.display_name.is_empty() {
            u.login
        } else {
            u.display_name
        };
        Self {
            provider_user_id: u.id,
            username,
            avatar_url: u.profile_image_url.unwrap_or_default(),
        }
    }
}

/// The OAuth authorization-code flow, abstracted so handlers can be tested
/// without a live provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Authorization URL the browser is sent to.
    fn authorize_url(&self, state: &str, scopes: &[&str]) -> AppResult<String>;

    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse>;

    async fn fetch_identity(&self, access_token: &str) -> AppResult<ProviderIdentity>;
}

#[derive(Debug, Clone)]
pub struct TwitchService {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl TwitchService {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client,
            client_id: config.twitch.client_id.clone(),
            client_secret: config.twitch.client_secret.clone(),
            redirect_uri: config.twitch.redirect_uri.clone(),
        })
    }

    pub fn get_required_scopes() -> Vec<&'static str> {
        REQUIRED_SCOPES.to_vec()
    }

    /// Get user info by access token
    pub async fn get_user(&self, access_token: &str) -> AppResult<TwitchUser> {
        let response = self
            .client
            .get(format!("{}/users", TWITCH_API_URL))
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Client-Id", &self.client_id)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::TwitchApi(format!(
                "Failed to get user: {}",
                error_text
            )));
        }

        let users: TwitchUsersResponse = response
            .json()
            .await
            .map_err(|e| AppError::TwitchApi(format!("Failed to parse users response: {}", e)))?;

        users
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AppError::TwitchApi("No user found".to_string()))
    }
}

#[async_trait]
impl IdentityProvider for TwitchService {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn authorize_url(&self, state: &str, scopes: &[&str]) -> AppResult<String> {
        if self.client_id.is_empty() {
            return Err(AppError::Config(
                "Twitch client id is not configured".to_string(),
            ));
        }

        let scope = scopes.join(" ");
        let url = url::Url::parse_with_params(
            &format!("{}/authorize", TWITCH_AUTH_URL),
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Internal(e.into()))?;

        Ok(url.into())
    }

    /// Exchange authorization code for tokens
    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse> {
        let response = self
            .client
            .post(format!("{}/token", TWITCH_AUTH_URL))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::TwitchApi(format!(
                "Failed to exchange code: {}",
                error_text
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::TwitchApi(format!("Failed to parse token response: {}", e)))
    }

    async fn fetch_identity(&self, access_token: &str) -> AppResult<ProviderIdentity> {
        Ok(self.get_user(access_token).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn service(client_id: &str) -> TwitchService {
        let mut config = Config::default();
        config.twitch.client_id = client_id.to_string();
        config.twitch.client_secret = "secret".to_string();
        TwitchService::new(&config).unwrap()
    }

    #[test]
    fn authorize_url_carries_fixed_scopes_and_redirect() {
        let url = service("abc123")
            .authorize_url("state-token", &TwitchService::get_required_scopes())
            .unwrap();

        assert!(url.starts_with("https://id.twitch.tv/oauth2/authorize?"));
        let parsed = url::Url::parse(&url).unwrap();
        let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "abc123");
        assert_eq!(params["redirect_uri"], "http://localhost:5173/auth/confirm");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "channel:read:subscriptions bits:read");
        assert_eq!(params["state"], "state-token");
    }

    #[test]
    fn authorize_url_requires_client_id() {
        let res = service("").authorize_url("s", REQUIRED_SCOPES);
        assert!(matches!(res, Err(AppError::Config(_))));
    }

    #[test]
    fn identity_prefers_display_name() {
        let user = TwitchUser {
            id: "1".to_string(),
            login: "viewer".to_string(),
            display_name: "Viewer".to_string(),
            profile_image_url: None,
        };
        let identity = ProviderIdentity::from(user.clone());
        assert_eq!(identity.username, "Viewer");
        assert_eq!(identity.avatar_url, "");

        let no_display = TwitchUser {
            display_name: String::new(),
            ..user
        };
        assert_eq!(ProviderIdentity::from(no_display).username, "viewer");
    }
}
