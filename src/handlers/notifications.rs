use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::require_user;
use crate::errors::AppError;
use crate::models::Notification;
use crate::services::{auth, notifications};
use crate::state::AppState;

// GET /api/notifications
pub async fn feed(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, AppError> {
    let user = require_user(&state, &headers)?;
    Ok(Json(notifications::feed_for(&state, &user, 0)?))
}

// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = require_user(&state, &headers)?;
    notifications::mark_read(&state, &user, id)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/notifications/events (SSE)
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
    pub last_id: Option<i64>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource can't set headers, so the session token rides in the query.
    let user = auth::authenticate(&state, query.token.as_deref().unwrap_or(""))?;
    let role = user.role;

    // Subscribe before the catch-up read so nothing published in between is lost.
    let rx = state.notify_tx.subscribe();
    let mut catchup = notifications::feed_for(&state, &user, query.last_id.unwrap_or(0))?;
    catchup.reverse();
    let newest_seen = catchup.last().map(|n| n.id).unwrap_or(0);

    let catchup_stream = tokio_stream::iter(catchup.into_iter().map(|n| {
        let data = serde_json::to_string(&n).unwrap_or_default();
        Ok::<_, Infallible>(Event::default().data(data).event("notification"))
    }));

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(n) if n.id > newest_seen && n.visible_to(role) => {
            let data = serde_json::to_string(&n).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("notification")))
        }
        Ok(_) => None,
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "notification subscriber lagged");
            None
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    let combined = catchup_stream.chain(live_stream);
    let merged = StreamExt::merge(combined, keepalive_stream);

    Ok(Sse::new(merged))
}
