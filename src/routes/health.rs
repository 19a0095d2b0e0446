use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
    pub timestamp: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, code, database) = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => ("healthy", StatusCode::OK, "ok".to_string()),
        Err(e) => {
            tracing::warn!("Health check database ping failed: {:?}", e);
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, "unreachable".to_string())
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        database,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (code, Json(response))
}
