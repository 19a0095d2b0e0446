use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub twitch: TwitchConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS. Also used to infer the cookie `Secure` flag.
    pub frontend_url: String,
    /// Whether to set the `Secure` flag on the session cookie.
    /// If `None`, inferred from `frontend_url` (`https` -> true).
    /// Read from env var `COOKIE_SECURE` (accepted values: "true"/"false", "1"/"0", "yes"/"no").
    pub cookie_secure: Option<bool>,
    /// Directory of front-end assets served for unmatched paths.
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for the /auth endpoints
    pub auth_per_second: u32,
    /// Burst size for the /auth endpoints
    pub auth_burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    /// Interval between countdown events on the overlay stream.
    pub tick_millis: u64,
}

impl ServerConfig {
    pub fn secure_cookies(&self) -> bool {
        self.cookie_secure
            .unwrap_or_else(|| self.frontend_url.starts_with("https://"))
    }
}

fn parse_flag(value: Option<String>) -> Option<bool> {
    match value?.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            server: ServerConfig {
                host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: var("PORT")
                    .unwrap_or_else(|| "5173".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: var("FRONTEND_URL")
                    .unwrap_or_else(|| "http://localhost:5173".to_string()),
                cookie_secure: parse_flag(var("COOKIE_SECURE")),
                static_dir: var("STATIC_DIR").filter(|d| !d.is_empty()),
            },
            database: DatabaseConfig {
                url: var("DATABASE_URL")
                    .unwrap_or_else(|| "sqlite://data/checkin.db".to_string()),
                max_connections: var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            twitch: TwitchConfig {
                client_id: var("TWITCH_CLIENT_ID")
                    .ok_or_else(|| ConfigError::MissingEnv("TWITCH_CLIENT_ID".to_string()))?,
                client_secret: var("TWITCH_CLIENT_SECRET")
                    .ok_or_else(|| ConfigError::MissingEnv("TWITCH_CLIENT_SECRET".to_string()))?,
                redirect_uri: var("TWITCH_REDIRECT_URI")
                    .unwrap_or_else(|| "http://localhost:5173/auth/confirm".to_string()),
            },
            jwt: JwtConfig {
                secret: var("JWT_SECRET")
                    .ok_or_else(|| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|| "168".to_string())
                    .parse()
                    .unwrap_or(168),
            },
            rate_limit: RateLimitConfig {
                auth_per_second: var("RATE_LIMIT_AUTH_PER_SECOND")
                    .unwrap_or_else(|| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                auth_burst: var("RATE_LIMIT_AUTH_BURST")
                    .unwrap_or_else(|| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            overlay: OverlayConfig {
                tick_millis: var("OVERLAY_TICK_MILLIS")
                    .unwrap_or_else(|| "1000".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("OVERLAY_TICK_MILLIS".to_string()))?,
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5173,
                frontend_url: "http://localhost:5173".to_string(),
                cookie_secure: None,
                static_dir: None,
            },
            database: DatabaseConfig {
                url: "sqlite://data/checkin.db".to_string(),
                max_connections: 5,
            },
            twitch: TwitchConfig {
                client_id: String::new(),
                client_secret: String::new(),
                redirect_uri: "http://localhost:5173/auth/confirm".to_string(),
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 168,
            },
            rate_limit: RateLimitConfig {
                auth_per_second: 3,
                auth_burst: 10,
            },
            overlay: OverlayConfig { tick_millis: 1000 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("TWITCH_CLIENT_ID", "client"),
        ("TWITCH_CLIENT_SECRET", "secret"),
        ("JWT_SECRET", "jwt"),
    ];

    fn with_required(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(extra);
        pairs
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.server.port, 5173);
        assert_eq!(config.database.url, "sqlite://data/checkin.db");
        assert_eq!(config.twitch.redirect_uri, "http://localhost:5173/auth/confirm");
        assert_eq!(config.jwt.expiration_hours, 168);
        assert_eq!(config.overlay.tick_millis, 1000);
        assert_eq!(config.server.cookie_secure, None);
        assert_eq!(config.server.static_dir, None);
    }

    #[test]
    fn overrides_are_read() {
        let pairs = with_required(&[
            ("PORT", "8080"),
            ("COOKIE_SECURE", "yes"),
            ("STATIC_DIR", "build"),
            ("OVERLAY_TICK_MILLIS", "250"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.cookie_secure, Some(true));
        assert_eq!(config.server.static_dir.as_deref(), Some("build"));
        assert_eq!(config.overlay.tick_millis, 250);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let pairs = with_required(&[("PORT", "not-a-port")]);
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name) if name == "PORT"));

        let pairs = with_required(&[("OVERLAY_TICK_MILLIS", "-5")]);
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name) if name == "OVERLAY_TICK_MILLIS"));
    }

    #[test]
    fn missing_secrets_are_reported() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "jwt"), ("TWITCH_CLIENT_SECRET", "s")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ref name) if name == "TWITCH_CLIENT_ID"));

        let err = Config::from_lookup(lookup(&[("TWITCH_CLIENT_ID", "c"), ("TWITCH_CLIENT_SECRET", "s")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ref name) if name == "JWT_SECRET"));
    }

    #[test]
    fn secure_cookies_follow_frontend_scheme() {
        let mut server = Config::default().server;
        assert!(!server.secure_cookies());

        server.frontend_url = "https://checkin.example.com".to_string();
        assert!(server.secure_cookies());

        server.cookie_secure = Some(false);
        assert!(!server.secure_cookies());
    }
}
