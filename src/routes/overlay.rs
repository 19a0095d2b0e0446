use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::Serialize;

use crate::db::{EndTime, EndTimeRepository};
use crate::error::LoadError;
use crate::services::countdown::CountdownState;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(overlay))
        .route("/stream", get(countdown_stream))
}

#[derive(Debug, Serialize)]
pub struct EndTimeResponse {
    pub id: i64,
    pub end_time: DateTime<Utc>,
}

impl From<EndTime> for EndTimeResponse {
    fn from(e: EndTime) -> Self {
        Self {
            id: e.id,
            end_time: e.end_time_utc(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OverlayPage {
    pub end_time: EndTimeResponse,
}

/// Page load: the countdown target.
async fn overlay(State(state): State<Arc<AppState>>) -> Result<Json<OverlayPage>, LoadError> {
    let end_time = EndTimeRepository::fetch_single(&state.db).await?;
    Ok(Json(OverlayPage {
        end_time: end_time.into(),
    }))
}

/// Server-sent countdown ticks. Each connection owns its own countdown state.
async fn countdown_stream(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, LoadError> {
    let end_time = EndTimeRepository::fetch_single(&state.db).await?;
    let countdown = CountdownState::default();
    countdown.set_end_date(Some(end_time.end_time_utc()));
    let interval = tokio::time::interval(Duration::from_millis(state.config.overlay.tick_millis.max(1)));

    let ticks = stream::unfold((countdown, interval), |(countdown, mut interval)| async move {
        interval.tick().await;
        countdown.tick_local();
        let event = match Event::default().event("tick").json_data(countdown.snapshot()) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Failed to encode countdown tick: {:?}", e);
                Event::default().event("error").data("encode failed")
            }
        };
        Some((Ok(event), (countdown, interval)))
    });

    Ok(Sse::new(ticks).keep_alive(KeepAlive::default()))
}
