use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::Serialize;

use crate::db::CheckInWithProfile;
use crate::error::{ErrorObject, LoadError};
use crate::routes::auth::AuthUser;
use crate::services::checkins::{CheckinOutcome, CheckinService, CheckinWindow, ALREADY_CHECKED_IN};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_checkins).post(check_in))
}

#[derive(Debug, Serialize)]
pub struct CheckinsPage {
    pub checkins_with_profiles: Vec<CheckInWithProfile>,
}

#[derive(Debug, Serialize)]
pub struct ActionSuccess {
    pub success: bool,
}

/// Page load: every check-in with its profile.
async fn list_checkins(State(state): State<Arc<AppState>>) -> Result<Json<CheckinsPage>, LoadError> {
    let checkins_with_profiles = CheckinService::list(&state.db).await?;
    Ok(Json(CheckinsPage {
        checkins_with_profiles,
    }))
}

/// Form action: check the signed-in viewer in for today.
async fn check_in(State(state): State<Arc<AppState>>, AuthUser(profile): AuthUser) -> Response {
    let window = CheckinWindow::for_instant(&Local::now());

    match CheckinService::check_in(&state.db, &profile.id, window).await {
        Ok(CheckinOutcome::Recorded(_)) => Json(ActionSuccess { success: true }).into_response(),
        Ok(CheckinOutcome::AlreadyCheckedIn) => (
            StatusCode::CONFLICT,
            Json(ErrorObject {
                error: ALREADY_CHECKED_IN.to_string(),
            }),
        )
            .into_response(),
        Err(e) => LoadError(e).into_response(),
    }
}
