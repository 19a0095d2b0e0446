use sqlx::Row;
use sqlx::SqlitePool;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

pub struct EndTimeRepository;

impl EndTimeRepository {
    /// Fetch the singleton countdown target. Fails unless exactly one row exists.
    pub async fn fetch_single(pool: &SqlitePool) -> AppResult<EndTime> {
        let rows = sqlx::query("SELECT id, end_time FROM end_time ORDER BY id LIMIT 2")
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

        match rows.as_slice() {
            [r] => Ok(EndTime {
                id: r.get("id"),
                end_time: r.get("end_time"),
            }),
            [] => Err(AppError::NotFound("No end time configured".to_string())),
            _ => Err(AppError::Conflict(
                "Expected a single end time row, found several".to_string(),
            )),
        }
    }
}
