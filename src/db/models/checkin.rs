use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ProfileSummary;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: i64,
    /// UTC instant of the check-in.
    pub created_at: NaiveDateTime,
    /// Local calendar day the check-in counts for.
    pub checkin_day: NaiveDate,
    pub profile_id: String,
}

/// A check-in joined with the profile that made it. The `profiles` key
/// mirrors the embedded-relation shape the front end reads.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInWithProfile {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub profile_id: String,
    pub profiles: ProfileSummary,
}

#[derive(Debug, Clone)]
pub struct CreateCheckIn {
    pub profile_id: String,
    pub created_at: NaiveDateTime,
    pub checkin_day: NaiveDate,
}
