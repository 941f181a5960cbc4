use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::appointment::partition_by_date;
use crate::models::{
    Appointment, AppointmentFilter, AppointmentId, AppointmentStatus, Doctor, DoctorId,
    NewAppointment, Notification, TimeSlot, User, UserId,
};
use crate::services::notifications;
use crate::services::scheduling::{is_date_available, is_slot_booked};
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("{0}")]
    Invalid(String),

    #[error("Doctor not found")]
    UnknownDoctor,

    #[error("The selected date is not available for this doctor")]
    DateUnavailable,

    #[error("This time slot is already booked. Please select another time.")]
    SlotTaken,

    #[error("Appointment not found")]
    NotFound,

    #[error("{0}")]
    NotChangeable(String),

    #[error("Failed to book appointment. Please try again.")]
    BookFailed(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::MissingFields(_)
            | BookingError::Invalid(_)
            | BookingError::DateUnavailable => AppError::Validation(e.to_string()),
            BookingError::UnknownDoctor | BookingError::NotFound => AppError::NotFound(e.to_string()),
            BookingError::SlotTaken | BookingError::NotChangeable(_) => {
                AppError::Conflict(e.to_string())
            }
            BookingError::BookFailed(ref source) => {
                tracing::error!(error = %source, "appointment insert failed");
                AppError::Upstream(e.to_string())
            }
            BookingError::Store(StoreError::Duplicate) => {
                AppError::Conflict(BookingError::SlotTaken.to_string())
            }
            BookingError::Store(s) => AppError::Store(s),
            BookingError::Internal(e) => AppError::Internal(e),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub specialty: String,
    pub doctor_id: Option<DoctorId>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub reason: String,
}

impl BookingRequest {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if self.specialty.trim().is_empty() {
            missing.push("specialty");
        }
        if self.doctor_id.is_none() {
            missing.push("doctor");
        }
        if self.date.trim().is_empty() {
            missing.push("date");
        }
        if self.time.trim().is_empty() {
            missing.push("time");
        }
        if self.reason.trim().is_empty() {
            missing.push("reason");
        }
        missing
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| BookingError::Invalid(format!("Invalid date: {s} (expected YYYY-MM-DD)")))
}

fn parse_slot(s: &str) -> Result<TimeSlot, BookingError> {
    TimeSlot::parse(s).ok_or_else(|| BookingError::Invalid(format!("Unknown time slot: {s}")))
}

fn load_doctor(state: &AppState, id: DoctorId) -> Result<Doctor, BookingError> {
    let conn = state.conn()?;
    queries::get_doctor(&conn, id)?.ok_or(BookingError::UnknownDoctor)
}

/// Validates, runs the conflict pre-check, then inserts as `Confirmed`.
/// Nothing is written unless every check passes.
pub async fn book_appointment(
    state: &AppState,
    patient: &User,
    req: BookingRequest,
    today: NaiveDate,
) -> Result<Appointment, BookingError> {
    let missing = req.missing_fields();
    if !missing.is_empty() {
        return Err(BookingError::MissingFields(missing));
    }
    let Some(doctor_id) = req.doctor_id else {
        return Err(BookingError::MissingFields(vec!["doctor"]));
    };
    let date = parse_date(&req.date)?;
    let time = parse_slot(&req.time)?;

    let doctor = load_doctor(state, doctor_id)?;
    if !doctor.specialty.eq_ignore_ascii_case(req.specialty.trim()) {
        return Err(BookingError::Invalid(format!(
            "{} is not a {}",
            doctor.name,
            req.specialty.trim()
        )));
    }
    if !is_date_available(&doctor, date, today, state.booking_policy()) {
        return Err(BookingError::DateUnavailable);
    }

    let booked = state.appointments.booked_slots(doctor.id, date).await?;
    if is_slot_booked(doctor.id, date, time, &booked) {
        return Err(BookingError::SlotTaken);
    }

    let new = NewAppointment {
        id: AppointmentId::generate(),
        user_id: patient.id.clone(),
        patient_name: patient.name.clone(),
        doctor_id: doctor.id,
        doctor_name: doctor.name.clone(),
        specialty: doctor.specialty.clone(),
        date,
        time,
        status: AppointmentStatus::Confirmed,
        location: doctor.office_location(),
        reason: req.reason.trim().to_string(),
    };

    let appt = match state.appointments.insert(&new).await {
        Ok(appt) => appt,
        Err(StoreError::Duplicate) => return Err(BookingError::SlotTaken),
        Err(e) => return Err(BookingError::BookFailed(e)),
    };

    tracing::info!(
        appointment_id = %appt.id,
        doctor_id = %appt.doctor_id,
        date = %appt.date,
        time = %appt.time,
        "appointment booked"
    );
    Ok(appt)
}

#[derive(Debug, Serialize)]
pub struct AppointmentLists {
    pub upcoming: Vec<Appointment>,
    pub past: Vec<Appointment>,
}

pub async fn list_for_patient(
    state: &AppState,
    patient: &User,
    today: NaiveDate,
) -> Result<AppointmentLists, BookingError> {
    let appts = state.appointments.list_for_user(&patient.id).await?;
    let (upcoming, past) = partition_by_date(appts, today);
    Ok(AppointmentLists { upcoming, past })
}

pub async fn list_for_admin(
    state: &AppState,
    filter: &AppointmentFilter,
    today: NaiveDate,
) -> Result<AppointmentLists, BookingError> {
    let appts = state.appointments.list_all(filter).await?;
    let (upcoming, past) = partition_by_date(appts, today);
    Ok(AppointmentLists { upcoming, past })
}

/// Fetches an appointment the patient owns. Someone else's appointment is
/// reported as missing.
async fn owned_upcoming(
    state: &AppState,
    patient: &User,
    id: &AppointmentId,
    today: NaiveDate,
    action: &str,
) -> Result<Appointment, BookingError> {
    let appt = state
        .appointments
        .get(id)
        .await?
        .filter(|a| a.user_id == patient.id)
        .ok_or(BookingError::NotFound)?;
    if !appt.is_upcoming(today) {
        return Err(BookingError::NotChangeable(format!(
            "Only upcoming appointments can be {action}"
        )));
    }
    Ok(appt)
}

pub async fn cancel_appointment(
    state: &AppState,
    patient: &User,
    id: &AppointmentId,
    reason: &str,
    today: NaiveDate,
) -> Result<Appointment, BookingError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(BookingError::Invalid(
            "Please provide a reason for cancellation".to_string(),
        ));
    }

    let appt = owned_upcoming(state, patient, id, today, "cancelled").await?;
    state
        .appointments
        .update_status(&appt.id, AppointmentStatus::Cancelled, Some(reason))
        .await?;

    tracing::info!(appointment_id = %appt.id, "appointment cancelled by patient");
    state.appointments.get(&appt.id).await?.ok_or(BookingError::NotFound)
}

/// Cancels every upcoming appointment a user holds so their slots are freed.
/// Called before the account itself is removed.
pub async fn cancel_upcoming_for_user(
    state: &AppState,
    user_id: &UserId,
    today: NaiveDate,
) -> Result<usize, BookingError> {
    let upcoming: Vec<Appointment> = state
        .appointments
        .list_for_user(user_id)
        .await?
        .into_iter()
        .filter(|a| a.is_upcoming(today))
        .collect();

    for appt in &upcoming {
        state
            .appointments
            .update_status(&appt.id, AppointmentStatus::Cancelled, Some("Account deleted"))
            .await?;
    }
    if !upcoming.is_empty() {
        tracing::info!(user_id = %user_id, count = upcoming.len(), "cancelled appointments of deleted account");
    }
    Ok(upcoming.len())
}

/// Leaves the appointment untouched and asks the clinic, via an admin
/// notification, to arrange a new time.
pub async fn request_reschedule(
    state: &AppState,
    patient: &User,
    id: &AppointmentId,
    note: &str,
    today: NaiveDate,
) -> Result<Notification, BookingError> {
    let note = note.trim();
    if note.is_empty() {
        return Err(BookingError::Invalid(
            "Please provide a note for reschedule request".to_string(),
        ));
    }

    let appt = owned_upcoming(state, patient, id, today, "rescheduled").await?;
    let message = format!(
        "{} asked to reschedule the appointment with {} on {} at {}. Note: {}",
        patient.name, appt.doctor_name, appt.date, appt.time, note
    );
    let notification =
        notifications::publish(state, "Reschedule Request", &message, "Admin", &patient.name)?;
    Ok(notification)
}

/// Admin status change. The new status must differ from the current one; a
/// blank note keeps whatever note is stored.
pub async fn update_status(
    state: &AppState,
    id: &AppointmentId,
    status: &str,
    note: Option<&str>,
) -> Result<Appointment, BookingError> {
    let status = AppointmentStatus::parse(status)
        .ok_or_else(|| BookingError::Invalid(format!("Unknown status: {status}")))?;
    let appt = state.appointments.get(id).await?.ok_or(BookingError::NotFound)?;
    if appt.status == status {
        return Err(BookingError::Invalid(
            "Please select a different status".to_string(),
        ));
    }

    let note = note.map(str::trim).filter(|n| !n.is_empty());
    match state.appointments.update_status(id, status, note).await {
        Ok(_) => {}
        Err(StoreError::Duplicate) => return Err(BookingError::SlotTaken),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(appointment_id = %id, from = appt.status.as_str(), to = status.as_str(), "appointment status changed");
    state.appointments.get(id).await?.ok_or(BookingError::NotFound)
}

#[derive(Debug, Default, Deserialize)]
pub struct EditRequest {
    pub date: Option<String>,
    pub time: Option<String>,
}

/// Admin edit of date and/or time. Runs the same availability and conflict
/// rules as booking, ignoring the appointment's own current slot.
pub async fn edit_appointment(
    state: &AppState,
    id: &AppointmentId,
    req: EditRequest,
    today: NaiveDate,
) -> Result<Appointment, BookingError> {
    let appt = state.appointments.get(id).await?.ok_or(BookingError::NotFound)?;

    let date = match req.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(d) => parse_date(d)?,
        None => appt.date,
    };
    let time = match req.time.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(t) => parse_slot(t)?,
        None => appt.time,
    };
    if date == appt.date && time == appt.time {
        return Ok(appt);
    }

    let doctor = load_doctor(state, appt.doctor_id)?;
    if !is_date_available(&doctor, date, today, state.booking_policy()) {
        return Err(BookingError::DateUnavailable);
    }

    let own = appt.booked_slot();
    let mut booked = state.appointments.booked_slots(doctor.id, date).await?;
    booked.retain(|b| *b != own);
    if is_slot_booked(doctor.id, date, time, &booked) {
        return Err(BookingError::SlotTaken);
    }

    match state.appointments.reschedule(id, date, time).await {
        Ok(_) => {}
        Err(StoreError::Duplicate) => return Err(BookingError::SlotTaken),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(appointment_id = %id, %date, time = %time, "appointment moved");
    state.appointments.get(id).await?.ok_or(BookingError::NotFound)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Datelike, Duration, Utc};

    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::{BookedSlot, Role, UserSettings};
    use crate::store::{AppointmentStore, SqliteStore};

    fn setup_state() -> AppState {
        let conn = db::init_db(":memory:").unwrap();
        db::seed::seed_doctors(&conn).unwrap();
        let db = Arc::new(Mutex::new(conn));
        let store = SqliteStore::new(db.clone());
        AppState::new(AppConfig::default(), db, Box::new(store))
    }

    fn patient(id: &str) -> User {
        User {
            id: UserId(id.to_string()),
            name: format!("Patient {id}"),
            email: format!("{id}@example.com"),
            role: Role::User,
            settings: UserSettings::default(),
            created_at: Utc::now().naive_utc(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 1).unwrap()
    }

    // 2030-03-18 is a Monday
    fn monday() -> String {
        "2030-03-18".to_string()
    }

    fn request(time: &str, reason: &str) -> BookingRequest {
        BookingRequest {
            specialty: "General Practitioner".to_string(),
            doctor_id: Some(DoctorId(1)),
            date: monday(),
            time: time.to_string(),
            reason: reason.to_string(),
        }
    }

    #[tokio::test]
    async fn test_book_success() {
        let state = setup_state();
        let appt = book_appointment(&state, &patient("p1"), request("10:00 AM", "Checkup"), today())
            .await
            .unwrap();
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert_eq!(appt.location, "General Practitioner Office");
        assert_eq!(appt.doctor_name, "Dr. Sarah Johnson");
        assert_eq!(appt.reason, "Checkup");
        assert_eq!(appt.date.weekday(), chrono::Weekday::Mon);
    }

    #[tokio::test]
    async fn test_empty_reason_rejected_before_insert() {
        let state = setup_state();
        let err = book_appointment(&state, &patient("p1"), request("10:00 AM", "   "), today())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::MissingFields(ref f) if f == &vec!["reason"]));
        let all = state
            .appointments
            .list_all(&AppointmentFilter::default())
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_missing_fields_are_listed() {
        let state = setup_state();
        let err = book_appointment(&state, &patient("p1"), BookingRequest::default(), today())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required field(s): specialty, doctor, date, time, reason"
        );
    }

    #[tokio::test]
    async fn test_second_booking_same_slot_conflicts() {
        let state = setup_state();
        book_appointment(&state, &patient("p1"), request("10:00 AM", "a"), today())
            .await
            .unwrap();
        let err = book_appointment(&state, &patient("p2"), request("10:00 AM", "b"), today())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotTaken));
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unavailable_day_and_wrong_specialty() {
        let state = setup_state();
        let mut thursday = request("10:00 AM", "x");
        thursday.date = "2030-03-21".to_string();
        let err = book_appointment(&state, &patient("p1"), thursday, today())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DateUnavailable));

        let mut wrong = request("10:00 AM", "x");
        wrong.specialty = "Cardiologist".to_string();
        let err = book_appointment(&state, &patient("p1"), wrong, today())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Invalid(_)));

        let lunch = request("12:00 PM", "x");
        let err = book_appointment(&state, &patient("p1"), lunch, today())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_cancel_frees_slot_and_records_reason() {
        let state = setup_state();
        let p1 = patient("p1");
        let appt = book_appointment(&state, &p1, request("9:00 AM", "a"), today())
            .await
            .unwrap();

        let err = cancel_appointment(&state, &p1, &appt.id, "", today())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please provide a reason for cancellation");

        let err = cancel_appointment(&state, &patient("p2"), &appt.id, "not mine", today())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound));

        let cancelled = cancel_appointment(&state, &p1, &appt.id, "Feeling better", today())
            .await
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert_eq!(cancelled.note.as_deref(), Some("Feeling better"));

        book_appointment(&state, &patient("p2"), request("9:00 AM", "b"), today())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reschedule_request_notifies_admin() {
        let state = setup_state();
        let p1 = patient("p1");
        let appt = book_appointment(&state, &p1, request("9:00 AM", "a"), today())
            .await
            .unwrap();
        let mut rx = state.notify_tx.subscribe();

        let n = request_reschedule(&state, &p1, &appt.id, "Need a later time", today())
            .await
            .unwrap();
        assert_eq!(n.title, "Reschedule Request");
        assert_eq!(n.recipients, "Admin");
        assert!(n.message.contains("Need a later time"));
        assert_eq!(rx.recv().await.unwrap().id, n.id);

        let unchanged = state.appointments.get(&appt.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_admin_status_must_change() {
        let state = setup_state();
        let appt = book_appointment(&state, &patient("p1"), request("9:00 AM", "a"), today())
            .await
            .unwrap();

        let err = update_status(&state, &appt.id, "Confirmed", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Please select a different status");

        let updated = update_status(&state, &appt.id, "Completed", Some("Seen"))
            .await
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Completed);
        assert_eq!(updated.note.as_deref(), Some("Seen"));

        let updated = update_status(&state, &appt.id, "Scheduled", Some("  ")).await.unwrap();
        assert_eq!(updated.note.as_deref(), Some("Seen"));
    }

    #[tokio::test]
    async fn test_admin_edit_checks_conflicts_excluding_self() {
        let state = setup_state();
        let a = book_appointment(&state, &patient("p1"), request("9:00 AM", "a"), today())
            .await
            .unwrap();
        book_appointment(&state, &patient("p2"), request("9:30 AM", "b"), today())
            .await
            .unwrap();

        let err = edit_appointment(
            &state,
            &a.id,
            EditRequest {
                date: None,
                time: Some("9:30 AM".to_string()),
            },
            today(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BookingError::SlotTaken));

        let moved = edit_appointment(
            &state,
            &a.id,
            EditRequest {
                date: Some("2030-03-19".to_string()),
                time: Some("9:00 AM".to_string()),
            },
            today(),
        )
        .await
        .unwrap();
        assert_eq!(moved.date, NaiveDate::from_ymd_opt(2030, 3, 19).unwrap());
    }

    #[tokio::test]
    async fn test_cancel_upcoming_for_user_frees_slots() {
        let state = setup_state();
        let p1 = patient("p1");
        let first = book_appointment(&state, &p1, request("9:00 AM", "a"), today())
            .await
            .unwrap();
        book_appointment(&state, &p1, request("9:30 AM", "b"), today())
            .await
            .unwrap();
        let other = book_appointment(&state, &patient("p2"), request("10:00 AM", "c"), today())
            .await
            .unwrap();
        update_status(&state, &first.id, "Completed", None).await.unwrap();

        let cancelled = cancel_upcoming_for_user(&state, &p1.id, today()).await.unwrap();
        assert_eq!(cancelled, 1);

        let date = NaiveDate::from_ymd_opt(2030, 3, 18).unwrap();
        let booked = state.appointments.booked_slots(DoctorId(1), date).await.unwrap();
        let labels: Vec<&str> = booked.iter().map(|b| b.time.label()).collect();
        assert!(labels.contains(&"9:00 AM"));
        assert!(!labels.contains(&"9:30 AM"));
        let other = state.appointments.get(&other.id).await.unwrap().unwrap();
        assert_eq!(other.status, AppointmentStatus::Confirmed);
    }

    struct FailingStore;

    #[async_trait]
    impl AppointmentStore for FailingStore {
        async fn insert(&self, _new: &NewAppointment) -> Result<Appointment, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn booked_slots(&self, _d: DoctorId, _date: NaiveDate) -> Result<Vec<BookedSlot>, StoreError> {
            Ok(vec![])
        }
        async fn get(&self, _id: &AppointmentId) -> Result<Option<Appointment>, StoreError> {
            Ok(None)
        }
        async fn list_for_user(&self, _u: &UserId) -> Result<Vec<Appointment>, StoreError> {
            Ok(vec![])
        }
        async fn list_all(&self, _f: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
            Ok(vec![])
        }
        async fn update_status(
            &self,
            _id: &AppointmentId,
            _s: AppointmentStatus,
            _n: Option<&str>,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn reschedule(&self, _id: &AppointmentId, _d: NaiveDate, _t: TimeSlot) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_store_failure_on_insert_is_user_facing() {
        let conn = db::init_db(":memory:").unwrap();
        db::seed::seed_doctors(&conn).unwrap();
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(Mutex::new(conn)),
            Box::new(FailingStore),
        );
        let err = book_appointment(&state, &patient("p1"), request("9:00 AM", "a"), today())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to book appointment. Please try again.");
        assert!(matches!(AppError::from(err), AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_past_date_rejected() {
        let state = setup_state();
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        let mut req = request("9:00 AM", "a");
        req.date = yesterday.format("%Y-%m-%d").to_string();
        let err = book_appointment(&state, &patient("p1"), req, Utc::now().date_naive())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DateUnavailable));
    }
}
