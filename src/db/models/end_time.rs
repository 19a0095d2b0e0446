use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EndTime {
    pub id: i64,
    /// Countdown target, stored as UTC.
    pub end_time: NaiveDateTime,
}

impl EndTime {
    pub fn end_time_utc(&self) -> DateTime<Utc> {
        self.end_time.and_utc()
    }
}
