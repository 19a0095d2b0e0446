use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Profile Repository
// ============================================================================

pub struct ProfileRepository;

fn profile_from_row(r: &SqliteRow) -> Profile {
    Profile {
        id: r.get("id"),
        twitch_id: r.get("twitch_id"),
        twitch_username: r.get("twitch_username"),
        pfp_url: r.get("pfp_url"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

impl ProfileRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Profile>> {
        let row = sqlx::query(
            r#"
            SELECT id, twitch_id, twitch_username, pfp_url, created_at, updated_at
            FROM profiles
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.as_ref().map(profile_from_row))
    }

    /// Create the profile on first sign-in, or refresh the provider-owned
    /// fields (username, avatar) on later ones. The profile id never changes.
    pub async fn upsert_by_twitch_id(
        pool: &SqlitePool,
        twitch_id: &str,
        twitch_username: &str,
        pfp_url: &str,
    ) -> AppResult<Profile> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO profiles (id, twitch_id, twitch_username, pfp_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(twitch_id) DO UPDATE SET
                twitch_username = excluded.twitch_username,
                pfp_url = excluded.pfp_url,
                updated_at = excluded.updated_at
            RETURNING id, twitch_id, twitch_username, pfp_url, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(twitch_id)
        .bind(twitch_username)
        .bind(pfp_url)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(profile_from_row(&row))
    }
}
