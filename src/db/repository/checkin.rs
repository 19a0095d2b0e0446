use chrono::NaiveDateTime;
use sqlx::Row;
use sqlx::SqlitePool;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Check-in Repository
// ============================================================================

pub struct CheckinRepository;

impl CheckinRepository {
    /// All check-ins with the profile that made each one, in insertion order.
    pub async fn list_with_profiles(pool: &SqlitePool) -> AppResult<Vec<CheckInWithProfile>> {
        let rows = sqlx::query(
            r#"
            SELECT
                c.id, c.created_at, c.profile_id,
                p.twitch_username, p.pfp_url
            FROM checkins c
            INNER JOIN profiles p ON p.id = c.profile_id
            ORDER BY c.id ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let profile_id: String = r.get("profile_id");
                let created_at: NaiveDateTime = r.get("created_at");
                CheckInWithProfile {
                    id: r.get("id"),
                    created_at: created_at.and_utc(),
                    profiles: ProfileSummary {
                        id: profile_id.clone(),
                        twitch_username: r.get("twitch_username"),
                        pfp_url: r.get("pfp_url"),
                    },
                    profile_id,
                }
            })
            .collect())
    }

    /// Whether the profile has any check-in at or after `since` (UTC).
    pub async fn exists_since(
        pool: &SqlitePool,
        profile_id: &str,
        since: NaiveDateTime,
    ) -> AppResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM checkins
            WHERE profile_id = ? AND created_at >= ?
            "#,
        )
        .bind(profile_id)
        .bind(since)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    /// Insert a check-in. Returns `None` when the profile already has one for
    /// `checkin_day` (unique constraint on `(profile_id, checkin_day)`).
    pub async fn insert(pool: &SqlitePool, new: &CreateCheckIn) -> AppResult<Option<CheckIn>> {
        let result = sqlx::query(
            r#"
            INSERT INTO checkins (created_at, checkin_day, profile_id)
            VALUES (?, ?, ?)
            RETURNING id, created_at, checkin_day, profile_id
            "#,
        )
        .bind(new.created_at)
        .bind(new.checkin_day)
        .bind(&new.profile_id)
        .fetch_one(pool)
        .await;

        match result {
            Ok(r) => Ok(Some(CheckIn {
                id: r.get("id"),
                created_at: r.get("created_at"),
                checkin_day: r.get("checkin_day"),
                profile_id: r.get("profile_id"),
            })),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ProfileRepository;
    use crate::test_utils::{count_checkins, test_pool};
    use chrono::NaiveDate;

    fn at(day: NaiveDate, h: u32, m: u32, s: u32) -> NaiveDateTime {
        day.and_hms_opt(h, m, s).unwrap()
    }

    #[tokio::test]
    async fn listing_pairs_profiles_in_insertion_order() {
        let pool = test_pool().await;
        let alice = ProfileRepository::upsert_by_twitch_id(&pool, "1", "alice", "https://cdn/alice.png")
            .await
            .unwrap();
        let bob = ProfileRepository::upsert_by_twitch_id(&pool, "2", "bob", "https://cdn/bob.png")
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        for (profile, hour) in [(&bob, 9), (&alice, 8), (&bob, 7)] {
            let d = if hour == 7 { day.succ_opt().unwrap() } else { day };
            CheckinRepository::insert(
                &pool,
                &CreateCheckIn {
                    profile_id: profile.id.clone(),
                    created_at: at(d, hour, 0, 0),
                    checkin_day: d,
                },
            )
            .await
            .unwrap()
            .unwrap();
        }

        let rows = CheckinRepository::list_with_profiles(&pool).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.profiles.twitch_username.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice", "bob"]);
        assert!(rows.windows(2).all(|w| w[0].id < w[1].id));

        assert_eq!(rows[1].profile_id, alice.id);
        assert_eq!(rows[1].profiles.id, alice.id);
        assert_eq!(rows[1].profiles.pfp_url, "https://cdn/alice.png");
        assert_eq!(rows[1].created_at, at(day, 8, 0, 0).and_utc());
    }

    #[tokio::test]
    async fn exists_since_is_inclusive() {
        let pool = test_pool().await;
        let p = ProfileRepository::upsert_by_twitch_id(&pool, "1", "alice", "").await.unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        CheckinRepository::insert(
            &pool,
            &CreateCheckIn {
                profile_id: p.id.clone(),
                created_at: at(day, 5, 0, 0),
                checkin_day: day,
            },
        )
        .await
        .unwrap();

        assert!(CheckinRepository::exists_since(&pool, &p.id, at(day, 5, 0, 0)).await.unwrap());
        assert!(CheckinRepository::exists_since(&pool, &p.id, at(day, 4, 59, 59)).await.unwrap());
        assert!(!CheckinRepository::exists_since(&pool, &p.id, at(day, 5, 0, 1)).await.unwrap());
    }

    #[tokio::test]
    async fn second_insert_for_same_day_is_rejected_by_constraint() {
        let pool = test_pool().await;
        let p = ProfileRepository::upsert_by_twitch_id(&pool, "1", "alice", "").await.unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let first = CreateCheckIn {
            profile_id: p.id.clone(),
            created_at: at(day, 10, 0, 0),
            checkin_day: day,
        };
        let second = CreateCheckIn {
            created_at: at(day, 11, 0, 0),
            ..first.clone()
        };

        assert!(CheckinRepository::insert(&pool, &first).await.unwrap().is_some());
        assert!(CheckinRepository::insert(&pool, &second).await.unwrap().is_none());
        assert_eq!(count_checkins(&pool, &p.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn insert_for_unknown_profile_fails() {
        let pool = test_pool().await;
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let res = CheckinRepository::insert(
            &pool,
            &CreateCheckIn {
                profile_id: "nobody".to_string(),
                created_at: at(day, 10, 0, 0),
                checkin_day: day,
            },
        )
        .await;

        assert!(matches!(res, Err(AppError::Database(_))));
    }
}
