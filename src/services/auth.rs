use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::{Profile, ProfileRepository};
use crate::error::{AppError, AppResult};
use crate::services::twitch::TwitchService;
use crate::AppState;

/// Name of the cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub csrf_token: String,
    pub provider: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    /// Start an OAuth sign-in: returns the provider authorization URL the
    /// browser should be redirected to.
    pub fn sign_in_with_oauth(state: &Arc<AppState>) -> AppResult<String> {
        let state_jwt = Self::generate_oauth_state(state)?;
        let scopes = TwitchService::get_required_scopes();
        state.identity.authorize_url(&state_jwt, &scopes)
    }

    /// Finish an OAuth sign-in: validate the returned state, exchange the
    /// code, create or refresh the profile and issue a session token.
    pub async fn complete_sign_in(
        state: &Arc<AppState>,
        code: &str,
        state_encoded: &str,
    ) -> AppResult<(String, Profile)> {
        let oauth_state = Self::decode_oauth_state(state, state_encoded)?;
        if oauth_state.provider != state.identity.name() {
            return Err(AppError::BadRequest(format!(
                "Unexpected OAuth provider: {}",
                oauth_state.provider
            )));
        }

        let token_response = state.identity.exchange_code(code).await?;
        let identity = state
            .identity
            .fetch_identity(&token_response.access_token)
            .await?;

        let profile = ProfileRepository::upsert_by_twitch_id(
            &state.db,
            &identity.provider_user_id,
            &identity.username,
            &identity.avatar_url,
        )
        .await?;

        let token = Self::create_jwt(state, &profile.id)?;

        tracing::info!(
            "OAuth sign-in successful for profile {} (twitch_id: {})",
            profile.id,
            profile.twitch_id
        );

        Ok((token, profile))
    }

    /// Generate OAuth state JWT (10 minute lifetime)
    pub fn generate_oauth_state(state: &Arc<AppState>) -> AppResult<String> {
        let now = Utc::now();
        let state_claims = OAuthState {
            csrf_token: Self::generate_random_string(32),
            provider: state.identity.name().to_string(),
            iat: now.timestamp() as usize,
            exp: (now + Duration::minutes(10)).timestamp() as usize,
        };

        let state_jwt = encode(
            &Header::default(),
            &state_claims,
            &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        )?;

        Ok(state_jwt)
    }

    /// Decode and validate OAuth state JWT
    pub fn decode_oauth_state(
        state: &Arc<AppState>,
        state_encoded: &str,
    ) -> AppResult<OAuthState> {
        let token_data = decode::<OAuthState>(
            state_encoded,
            &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::error!("Failed to decode OAuth state: {:?}", e);
            e
        })?;
        Ok(token_data.claims)
    }

    /// Create a signed session JWT for a profile id
    pub fn create_jwt(state: &Arc<AppState>, profile_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(state.config.jwt.expiration_hours);
        let claims = Claims {
            sub: profile_id.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn decode_jwt(state: &Arc<AppState>, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub async fn get_profile_from_token(state: &Arc<AppState>, token: &str) -> AppResult<Profile> {
        let claims = Self::decode_jwt(state, token)?;
        ProfileRepository::find_by_id(&state.db, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    pub fn generate_random_string(length: usize) -> String {
        use rand::Rng;
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}
