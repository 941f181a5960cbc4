use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{Connection, ErrorCode};

use super::{AppointmentStore, StoreError};
use crate::db::queries;
use crate::models::{
    Appointment, AppointmentFilter, AppointmentId, AppointmentStatus, BookedSlot, DoctorId,
    NewAppointment, TimeSlot, UserId,
};

/// Appointments in the shared SQLite database. The partial unique index on
/// active (doctor_id, date, time) turns a lost booking race into `Duplicate`.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".to_string()))
    }
}

fn map_write_error(e: anyhow::Error) -> StoreError {
    match e.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Duplicate
        }
        _ => StoreError::Backend(e),
    }
}

#[async_trait]
impl AppointmentStore for SqliteStore {
    async fn insert(&self, new: &NewAppointment) -> Result<Appointment, StoreError> {
        let conn = self.lock()?;
        queries::insert_appointment(&conn, new).map_err(map_write_error)
    }

    async fn booked_slots(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
    ) -> Result<Vec<BookedSlot>, StoreError> {
        let conn = self.lock()?;
        Ok(queries::get_booked_slots(&conn, doctor_id, date)?)
    }

    async fn get(&self, id: &AppointmentId) -> Result<Option<Appointment>, StoreError> {
        let conn = self.lock()?;
        Ok(queries::get_appointment(&conn, id)?)
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Appointment>, StoreError> {
        let conn = self.lock()?;
        Ok(queries::list_appointments_for_user(&conn, user_id)?)
    }

    async fn list_all(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let appts = {
            let conn = self.lock()?;
            queries::list_appointments(&conn, filter.status)?
        };
        Ok(filter.apply(appts))
    }

    async fn update_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
        note: Option<&str>,
    ) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        // Reactivating a cancelled appointment can collide with a newer booking.
        queries::update_appointment_status(&conn, id, status, note).map_err(map_write_error)
    }

    async fn reschedule(
        &self,
        id: &AppointmentId,
        date: NaiveDate,
        time: TimeSlot,
    ) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        queries::reschedule_appointment(&conn, id, date, time).map_err(map_write_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn store() -> SqliteStore {
        SqliteStore::new(Arc::new(Mutex::new(db::init_db(":memory:").unwrap())))
    }

    fn new_appt(patient: &str, time: &str) -> NewAppointment {
        NewAppointment {
            id: AppointmentId::generate(),
            user_id: UserId(format!("{patient}-id")),
            patient_name: patient.to_string(),
            doctor_id: DoctorId(2),
            doctor_name: "Dr. Michael Chen".to_string(),
            specialty: "Cardiologist".to_string(),
            date: NaiveDate::from_ymd_opt(2030, 3, 18).unwrap(),
            time: TimeSlot::parse(time).unwrap(),
            status: AppointmentStatus::Confirmed,
            location: "Cardiologist Office".to_string(),
            reason: "Chest pain".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_insert_maps_to_duplicate() {
        let store = store();
        store.insert(&new_appt("Ann", "11:00 AM")).await.unwrap();
        let err = store.insert(&new_appt("Bob", "11:00 AM")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn test_reschedule_onto_taken_slot_is_duplicate() {
        let store = store();
        store.insert(&new_appt("Ann", "11:00 AM")).await.unwrap();
        let bob = store.insert(&new_appt("Bob", "1:00 PM")).await.unwrap();
        let err = store
            .reschedule(&bob.id, bob.date, TimeSlot::parse("11:00 AM").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn test_list_all_applies_filter() {
        let store = store();
        store.insert(&new_appt("Ann Lee", "9:00 AM")).await.unwrap();
        let bob = store.insert(&new_appt("Bob Ray", "9:30 AM")).await.unwrap();
        store
            .update_status(&bob.id, AppointmentStatus::Completed, None)
            .await
            .unwrap();

        let filter = AppointmentFilter {
            search: Some("ann".to_string()),
            ..Default::default()
        };
        let found = store.list_all(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].patient_name, "Ann Lee");

        let filter = AppointmentFilter {
            status: Some(AppointmentStatus::Completed),
            ..Default::default()
        };
        let found = store.list_all(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].patient_name, "Bob Ray");

        let counts = store.counts().await.unwrap();
        assert_eq!(counts["Confirmed"], 1);
        assert_eq!(counts["Completed"], 1);
        assert_eq!(counts["Cancelled"], 0);
    }
}
