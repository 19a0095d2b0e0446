use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::db::{CheckIn, CheckInWithProfile, CheckinRepository, CreateCheckIn};
use crate::error::AppResult;

/// Message shown when a viewer tries to check in twice on the same day.
pub const ALREADY_CHECKED_IN: &str = "You have already checked in today";

/// The instant of a check-in and the local calendar day it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckinWindow {
    /// Local calendar day.
    pub day: NaiveDate,
    /// Local midnight starting `day`, as UTC. Inclusive lower bound.
    pub since: NaiveDateTime,
    /// The check-in instant, as UTC.
    pub at: NaiveDateTime,
}

impl CheckinWindow {
    pub fn for_instant<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let day = now.date_naive();
        let midnight = day.and_time(NaiveTime::MIN);

        // Midnight can fall in a DST gap; fall back to subtracting the local
        // time of day from `now`.
        let since = match now.timezone().from_local_datetime(&midnight).earliest() {
            Some(start) => start.with_timezone(&Utc),
            None => now.with_timezone(&Utc) - (now.naive_local() - midnight),
        };

        Self {
            day,
            since: since.naive_utc(),
            at: now.with_timezone(&Utc).naive_utc(),
        }
    }
}

#[derive(Debug)]
pub enum CheckinOutcome {
    Recorded(CheckIn),
    AlreadyCheckedIn,
}

pub struct CheckinService;

impl CheckinService {
    pub async fn list(pool: &SqlitePool) -> AppResult<Vec<CheckInWithProfile>> {
        CheckinRepository::list_with_profiles(pool).await
    }

    /// Record today's check-in for `profile_id` unless one already exists.
    ///
    /// The existence check gives the friendly rejection; the unique
    /// `(profile_id, checkin_day)` constraint catches submissions that race
    /// past it.
    pub async fn check_in(
        pool: &SqlitePool,
        profile_id: &str,
        window: CheckinWindow,
    ) -> AppResult<CheckinOutcome> {
        if CheckinRepository::exists_since(pool, profile_id, window.since).await? {
            tracing::info!("Profile {} already checked in on {}", profile_id, window.day);
            return Ok(CheckinOutcome::AlreadyCheckedIn);
        }

        let new = CreateCheckIn {
            profile_id: profile_id.to_string(),
            created_at: window.at,
            checkin_day: window.day,
        };

        match CheckinRepository::insert(pool, &new).await? {
            Some(checkin) => {
                tracing::info!("Recorded check-in {} for profile {}", checkin.id, profile_id);
                Ok(CheckinOutcome::Recorded(checkin))
            }
            None => {
                tracing::info!(
                    "Concurrent check-in for profile {} on {} rejected by constraint",
                    profile_id,
                    window.day
                );
                Ok(CheckinOutcome::AlreadyCheckedIn)
            }
        }
    }
}
