use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::doctors::DoctorResponse;
use super::{require_admin, today};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::schedule::parse_weekday;
use crate::models::{
    Appointment, AppointmentFilter, AppointmentId, AppointmentStatus, DoctorId, Notification,
    NotificationTemplate, Role, ScheduleEntry, ScheduleStatus, User, UserId,
};
use crate::services::auth::{normalize_email, save_user, validate_email};
use crate::services::booking::{self, AppointmentLists, EditRequest};
use crate::services::notifications::{self, GroupSummary, SendRequest};
use crate::state::AppState;

// GET /api/admin/dashboard
#[derive(Serialize)]
pub struct DashboardResponse {
    total_patients: i64,
    total_doctors: i64,
    appointments_today: usize,
    upcoming_appointments: usize,
    by_status: BTreeMap<&'static str, usize>,
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, AppError> {
    require_admin(&state, &headers)?;

    let (total_patients, total_doctors) = {
        let conn = state.conn()?;
        (
            queries::count_users(&conn, Role::User)?,
            queries::count_doctors(&conn)?,
        )
    };

    let today = today();
    let all = state
        .appointments
        .list_all(&AppointmentFilter::default())
        .await?;
    let appointments_today = all
        .iter()
        .filter(|a| a.date == today && a.status.is_active())
        .count();
    let upcoming_appointments = all.iter().filter(|a| a.is_upcoming(today)).count();
    let by_status = state.appointments.counts().await?;

    Ok(Json(DashboardResponse {
        total_patients,
        total_doctors,
        appointments_today,
        upcoming_appointments,
        by_status,
    }))
}

// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, AppError> {
    require_admin(&state, &headers)?;
    let conn = state.conn()?;
    Ok(Json(queries::list_users(&conn)?))
}

// PUT /api/admin/users/:id
#[derive(Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<User>, AppError> {
    require_admin(&state, &headers)?;

    let conn = state.conn()?;
    let mut user = queries::get_user(&conn, &UserId(id.clone()))?
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;

    if let Some(name) = body.name.as_deref().map(str::trim) {
        if name.is_empty() {
            return Err(AppError::Validation("Name cannot be empty".to_string()));
        }
        user.name = name.to_string();
    }
    if let Some(email) = body.email.as_deref() {
        let email = normalize_email(email);
        validate_email(&email)?;
        user.email = email;
    }
    if let Some(role) = body.role.as_deref() {
        user.role = Role::parse(role.trim())
            .ok_or_else(|| AppError::Validation(format!("Unknown role: {role}")))?;
    }

    save_user(&conn, &user)?;
    tracing::info!(user_id = %user.id, "user updated by admin");
    Ok(Json(user))
}

// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin = require_admin(&state, &headers)?;
    if admin.id.as_str() == id {
        return Err(AppError::Validation(
            "You cannot delete your own account here".to_string(),
        ));
    }

    let user_id = UserId(id.clone());
    let exists = {
        let conn = state.conn()?;
        queries::get_user(&conn, &user_id)?.is_some()
    };
    if !exists {
        return Err(AppError::NotFound(format!("user {id}")));
    }

    booking::cancel_upcoming_for_user(&state, &user_id, today()).await?;
    {
        let conn = state.conn()?;
        queries::delete_user(&conn, &user_id)?;
    }
    tracing::info!(user_id = %id, "user deleted by admin");
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/admin/doctors
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<DoctorResponse>>, AppError> {
    require_admin(&state, &headers)?;
    let conn = state.conn()?;
    let doctors = queries::list_doctors(&conn)?;
    Ok(Json(doctors.into_iter().map(DoctorResponse::from).collect()))
}

// POST /api/admin/doctors
#[derive(Deserialize)]
pub struct NewDoctorRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub specialty: String,
}

pub async fn create_doctor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewDoctorRequest>,
) -> Result<(StatusCode, Json<DoctorResponse>), AppError> {
    require_admin(&state, &headers)?;
    let name = body.name.trim();
    let specialty = body.specialty.trim();
    if name.is_empty() || specialty.is_empty() {
        return Err(AppError::Validation(
            "Doctor name and specialty are required".to_string(),
        ));
    }

    let conn = state.conn()?;
    let id = queries::insert_doctor(&conn, name, specialty)?;
    let doctor = queries::get_doctor(&conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("doctor {id}")))?;
    Ok((StatusCode::CREATED, Json(doctor.into())))
}

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub day: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub status: Option<String>,
}

/// Overlays the request on `entry`, then validates the result as a whole.
fn apply_schedule_request(
    mut entry: ScheduleEntry,
    req: ScheduleRequest,
) -> Result<ScheduleEntry, AppError> {
    if let Some(day) = req.day.as_deref() {
        entry.day = parse_weekday(day).map_err(|e| AppError::Validation(e.to_string()))?;
    }
    if let Some(start) = req.start_time {
        entry.start_time = start.trim().to_string();
    }
    if let Some(end) = req.end_time {
        entry.end_time = end.trim().to_string();
    }
    if let Some(status) = req.status.as_deref() {
        entry.status = ScheduleStatus::parse(status.trim())
            .ok_or_else(|| AppError::Validation(format!("Unknown schedule status: {status}")))?;
    }
    ScheduleEntry::validate_hours(&entry.start_time, &entry.end_time)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(entry)
}

// POST /api/admin/doctors/:id/schedules
pub async fn add_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(doctor_id): Path<i64>,
    Json(body): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleEntry>), AppError> {
    require_admin(&state, &headers)?;
    if body.day.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(AppError::Validation("day is required".to_string()));
    }

    let base = ScheduleEntry {
        id: 0,
        day: chrono::Weekday::Mon,
        start_time: "09:00".to_string(),
        end_time: "17:00".to_string(),
        status: ScheduleStatus::Available,
    };
    let mut entry = apply_schedule_request(base, body)?;

    let conn = state.conn()?;
    let doctor_id = DoctorId(doctor_id);
    if queries::get_doctor(&conn, doctor_id)?.is_none() {
        return Err(AppError::NotFound(format!("doctor {doctor_id}")));
    }
    entry.id = queries::insert_schedule(&conn, doctor_id, &entry)?;
    tracing::info!(doctor_id = %doctor_id, schedule_id = entry.id, "schedule entry added");
    Ok((StatusCode::CREATED, Json(entry)))
}

// PUT /api/admin/schedules/:id
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ScheduleRequest>,
) -> Result<Json<ScheduleEntry>, AppError> {
    require_admin(&state, &headers)?;

    let conn = state.conn()?;
    let (_, current) = queries::get_schedule(&conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("schedule {id}")))?;
    let entry = apply_schedule_request(current, body)?;
    queries::update_schedule(&conn, &entry)?;
    Ok(Json(entry))
}

// DELETE /api/admin/schedules/:id
pub async fn delete_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let conn = state.conn()?;
    if !queries::delete_schedule(&conn, id)? {
        return Err(AppError::NotFound(format!("schedule {id}")));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/admin/appointments?search=&status=&limit=
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<AppointmentLists>, AppError> {
    require_admin(&state, &headers)?;

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(
            AppointmentStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("Unknown status: {s}")))?,
        ),
    };
    let filter = AppointmentFilter {
        search: query.search,
        status,
        limit: query.limit,
    };
    Ok(Json(booking::list_for_admin(&state, &filter, today()).await?))
}

// POST /api/admin/appointments/:id/status
#[derive(Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: String,
    pub note: Option<String>,
}

pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Appointment>, AppError> {
    require_admin(&state, &headers)?;
    let appt = booking::update_status(
        &state,
        &AppointmentId(id),
        &body.status,
        body.note.as_deref(),
    )
    .await?;
    Ok(Json(appt))
}

// PUT /api/admin/appointments/:id
pub async fn edit_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<EditRequest>,
) -> Result<Json<Appointment>, AppError> {
    require_admin(&state, &headers)?;
    let appt = booking::edit_appointment(&state, &AppointmentId(id), body, today()).await?;
    Ok(Json(appt))
}

// GET /api/admin/notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, AppError> {
    require_admin(&state, &headers)?;
    let conn = state.conn()?;
    Ok(Json(queries::list_notifications(&conn, 100)?))
}

// POST /api/admin/notifications
pub async fn send_notification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SendRequest>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let admin = require_admin(&state, &headers)?;
    let sent = notifications::send(&state, &admin, body, today()).await?;
    Ok((StatusCode::CREATED, Json(sent)))
}

// GET /api/admin/notifications/templates
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<&'static [NotificationTemplate]>, AppError> {
    require_admin(&state, &headers)?;
    Ok(Json(notifications::templates()))
}

// POST /api/admin/notifications/templates/:id/render
#[derive(Serialize)]
pub struct RenderedTemplate {
    title: &'static str,
    message: String,
}

pub async fn render_template(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(values): Json<HashMap<String, String>>,
) -> Result<Json<RenderedTemplate>, AppError> {
    require_admin(&state, &headers)?;
    let message = notifications::render_template(id, &values)?;
    let title = NotificationTemplate::find(id)
        .map(|t| t.title)
        .unwrap_or_default();
    Ok(Json(RenderedTemplate { title, message }))
}

// GET /api/admin/notifications/groups
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<GroupSummary>>, AppError> {
    require_admin(&state, &headers)?;
    Ok(Json(notifications::list_groups(&state, today()).await?))
}
