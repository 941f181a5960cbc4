use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::{require_user, today};
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentId, Notification};
use crate::services::booking::{self, AppointmentLists, BookingRequest};
use crate::state::AppState;

// POST /api/appointments
pub async fn book(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let patient = require_user(&state, &headers)?;
    let appt = booking::book_appointment(&state, &patient, body, today()).await?;
    Ok((StatusCode::CREATED, Json(appt)))
}

// GET /api/appointments
pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AppointmentLists>, AppError> {
    let patient = require_user(&state, &headers)?;
    Ok(Json(booking::list_for_patient(&state, &patient, today()).await?))
}

// POST /api/appointments/:id/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<Appointment>, AppError> {
    let patient = require_user(&state, &headers)?;
    let appt =
        booking::cancel_appointment(&state, &patient, &AppointmentId(id), &body.reason, today())
            .await?;
    Ok(Json(appt))
}

// POST /api/appointments/:id/reschedule
#[derive(Deserialize)]
pub struct RescheduleRequest {
    #[serde(default)]
    pub note: String,
}

pub async fn request_reschedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RescheduleRequest>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let patient = require_user(&state, &headers)?;
    let notification =
        booking::request_reschedule(&state, &patient, &AppointmentId(id), &body.note, today())
            .await?;
    Ok((StatusCode::ACCEPTED, Json(notification)))
}
