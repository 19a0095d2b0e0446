//! Initialization helpers for the application:
//! - database connection + migrations
//! - identity provider construction

use std::{path::Path, sync::Arc};

use anyhow::Result;

use crate::config::Config;
use crate::services::twitch::{IdentityProvider, TwitchService};

/// Redact potentially sensitive information from a database URL before logging.
///
/// Parsed URLs keep only scheme, host, port and path. Anything without a host
/// (e.g. `user:pw@host/db`, which parses with `user` as the scheme) has
/// everything up to the last '@' removed, or is replaced by "(redacted)".
pub fn redact_db_url(db_url: &str) -> String {
    if let Ok(url) = url::Url::parse(db_url) {
        if let Some(host) = url.host_str() {
            let port_part = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
            return format!("{}://{}{}{}", url.scheme(), host, port_part, url.path());
        }
    }

    match db_url.rfind('@') {
        Some(at_pos) => format!("(redacted){}", &db_url[at_pos + 1..]),
        None => "(redacted)".to_string(),
    }
}

/// Initialize SQLite database connection and run migrations.
///
/// Creates the parent directory for the database file (if applicable),
/// opens a connection pool using `create_if_missing(true)` with foreign keys
/// enforced, and runs migrations.
pub async fn init_db(config: &Config) -> Result<sqlx::SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("Connecting to database: {}", redact_db_url(db_url));

    let db_path = db_url.strip_prefix("sqlite://").unwrap_or(db_url);
    let db_file_path = Path::new(db_path);

    if let Some(parent) = db_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let existed = db_file_path.exists();

    let connect_options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    if existed {
        tracing::info!("Connected to database file: {}", db_file_path.display());
    } else {
        tracing::info!("Database file created: {}", db_file_path.display());
    }

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Build the OAuth identity provider used by the auth routes.
pub fn init_identity_provider(config: &Config) -> Result<Arc<dyn IdentityProvider>> {
    let twitch = TwitchService::new(config)?;
    tracing::info!(
        "Identity provider ready: {} (redirect: {})",
        twitch.name(),
        config.twitch.redirect_uri
    );
    Ok(Arc::new(twitch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_credentials() {
        assert_eq!(
            redact_db_url("postgres://user:pw@db.internal:5432/app"),
            "postgres://db.internal:5432/app"
        );
        assert_eq!(redact_db_url("user:pw@host/db"), "(redacted)host/db");
        assert_eq!(redact_db_url("data/checkin.db"), "(redacted)");
    }

    #[test]
    fn hostless_urls_never_leak_passwords() {
        for url in ["user:pw@host/db", "mysql:secret@db:3306/app", "sqlite:pw@local.db"] {
            let redacted = redact_db_url(url);
            assert!(!redacted.contains("pw"), "{} -> {}", url, redacted);
            assert!(!redacted.contains("secret"), "{} -> {}", url, redacted);
            assert!(redacted.starts_with("(redacted)"), "{} -> {}", url, redacted);
        }
        assert_eq!(redact_db_url("sqlite::memory:"), "(redacted)");
        assert_eq!(
            redact_db_url("sqlite://data/checkin.db"),
            "sqlite://data/checkin.db"
        );
    }

    #[tokio::test]
    async fn init_db_creates_file_and_schema() {
        let dir = std::env::temp_dir().join(format!("checkin-init-{}", uuid::Uuid::new_v4()));
        let mut config = Config::default();
        config.database.url = format!("sqlite://{}/nested/app.db", dir.display());

        let pool = init_db(&config).await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM checkins")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);

        pool.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}
