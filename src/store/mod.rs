pub mod rest;
pub mod sqlite;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentId, AppointmentStatus, BookedSlot, DoctorId,
    NewAppointment, TimeSlot, UserId,
};

pub use rest::RestTableStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another active appointment already holds the (doctor, date, time) triple.
    #[error("that time slot is already booked")]
    Duplicate,

    #[error("appointment store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Where appointments live. Users, doctors, and notifications always stay in
/// SQLite; appointments can be pointed at a hosted table instead.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, new: &NewAppointment) -> Result<Appointment, StoreError>;

    /// Active (non-cancelled) bookings for one doctor on one date.
    async fn booked_slots(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
    ) -> Result<Vec<BookedSlot>, StoreError>;

    async fn get(&self, id: &AppointmentId) -> Result<Option<Appointment>, StoreError>;

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Appointment>, StoreError>;

    async fn list_all(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;

    /// Returns false when no appointment has that id. A `None` note keeps the
    /// stored one.
    async fn update_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
        note: Option<&str>,
    ) -> Result<bool, StoreError>;

    async fn reschedule(
        &self,
        id: &AppointmentId,
        date: NaiveDate,
        time: TimeSlot,
    ) -> Result<bool, StoreError>;

    async fn counts(&self) -> Result<BTreeMap<&'static str, usize>, StoreError> {
        let all = self.list_all(&AppointmentFilter::default()).await?;
        let mut counts: BTreeMap<&'static str, usize> = AppointmentStatus::ALL
            .iter()
            .map(|s| (s.as_str(), 0))
            .collect();
        for appt in &all {
            *counts.entry(appt.status.as_str()).or_default() += 1;
        }
        Ok(counts)
    }
}
