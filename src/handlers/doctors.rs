use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::today;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::schedule::TIME_SLOT_LABELS;
use crate::models::{Doctor, DoctorId, ScheduleEntry, TimeSlot};
use crate::services::scheduling::{self, available_slots, is_date_available};
use crate::state::AppState;

const DEFAULT_HORIZON_DAYS: u32 = 30;
const MAX_HORIZON_DAYS: u32 = 90;

#[derive(Serialize)]
pub struct DoctorResponse {
    id: DoctorId,
    name: String,
    specialty: String,
    available_days: Vec<&'static str>,
    schedules: Vec<ScheduleEntry>,
}

impl From<Doctor> for DoctorResponse {
    fn from(d: Doctor) -> Self {
        Self {
            available_days: d.available_day_names(),
            id: d.id,
            name: d.name,
            specialty: d.specialty,
            schedules: d.schedules,
        }
    }
}

fn find_doctor(state: &AppState, id: i64) -> Result<Doctor, AppError> {
    let conn = state.conn()?;
    queries::get_doctor(&conn, DoctorId(id))?
        .ok_or_else(|| AppError::NotFound(format!("doctor {id}")))
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date: {s} (expected YYYY-MM-DD)")))
}

// GET /api/specialties
pub async fn list_specialties(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, AppError> {
    let doctors = {
        let conn = state.conn()?;
        queries::list_doctors(&conn)?
    };

    let mut specialties: Vec<String> = vec![];
    for doctor in doctors {
        if !specialties.contains(&doctor.specialty) {
            specialties.push(doctor.specialty);
        }
    }
    Ok(Json(specialties))
}

// GET /api/doctors?specialty=
#[derive(Deserialize)]
pub struct DoctorsQuery {
    pub specialty: Option<String>,
}

pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DoctorsQuery>,
) -> Result<Json<Vec<DoctorResponse>>, AppError> {
    let doctors = {
        let conn = state.conn()?;
        queries::list_doctors(&conn)?
    };

    let specialty = query.specialty.as_deref().map(str::trim).unwrap_or("");
    let response = doctors
        .into_iter()
        .filter(|d| specialty.is_empty() || d.specialty.eq_ignore_ascii_case(specialty))
        .map(DoctorResponse::from)
        .collect();
    Ok(Json(response))
}

// GET /api/doctors/:id/availability?date=
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    doctor_id: DoctorId,
    date: NaiveDate,
    date_available: bool,
    available_slots: Vec<TimeSlot>,
}

pub async fn availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let date = match query.date.as_deref() {
        Some(d) if !d.trim().is_empty() => parse_date(d)?,
        _ => return Err(AppError::Validation("date is required".to_string())),
    };
    let doctor = find_doctor(&state, id)?;

    let date_available = is_date_available(&doctor, date, today(), state.booking_policy());
    let slots = if date_available {
        let booked =
            scheduling::load_booked_slots_or_empty(&*state.appointments, doctor.id, date)
                .await;
        available_slots(doctor.id, date, &booked)
    } else {
        vec![]
    };

    Ok(Json(AvailabilityResponse {
        doctor_id: doctor.id,
        date,
        date_available,
        available_slots: slots,
    }))
}

// GET /api/doctors/:id/dates?from=&days=
#[derive(Deserialize)]
pub struct DatesQuery {
    pub from: Option<String>,
    pub days: Option<u32>,
}

#[derive(Serialize)]
pub struct DatesResponse {
    doctor_id: DoctorId,
    available_days: Vec<&'static str>,
    dates: Vec<NaiveDate>,
}

pub async fn bookable_dates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<DatesQuery>,
) -> Result<Json<DatesResponse>, AppError> {
    let today = today();
    let from = match query.from.as_deref() {
        Some(f) if !f.trim().is_empty() => parse_date(f)?,
        _ => today,
    };
    let days = query.days.unwrap_or(DEFAULT_HORIZON_DAYS).min(MAX_HORIZON_DAYS);
    let doctor = find_doctor(&state, id)?;

    let dates = scheduling::bookable_dates(&doctor, from, days, today, state.booking_policy());
    Ok(Json(DatesResponse {
        doctor_id: doctor.id,
        available_days: doctor.available_day_names(),
        dates,
    }))
}

// GET /api/time-slots
pub async fn time_slots() -> Json<Vec<&'static str>> {
    Json(TIME_SLOT_LABELS.to_vec())
}
