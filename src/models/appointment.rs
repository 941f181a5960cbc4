use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::ids::{AppointmentId, DoctorId, UserId};
use super::schedule::TimeSlot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub user_id: UserId,
    pub patient_name: String,
    pub doctor_id: DoctorId,
    pub doctor_name: String,
    pub specialty: String,
    pub date: NaiveDate,
    pub time: TimeSlot,
    pub status: AppointmentStatus,
    pub location: String,
    pub reason: String,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        !self.status.is_terminal() && self.date >= today
    }

    pub fn booked_slot(&self) -> BookedSlot {
        BookedSlot {
            doctor_id: self.doctor_id,
            date: self.date,
            time: self.time,
        }
    }
}

/// Fields supplied when inserting; the store assigns timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub id: AppointmentId,
    pub user_id: UserId,
    pub patient_name: String,
    pub doctor_id: DoctorId,
    pub doctor_name: String,
    pub specialty: String,
    pub date: NaiveDate,
    pub time: TimeSlot,
    pub status: AppointmentStatus,
    pub location: String,
    pub reason: String,
}

/// The (doctor, date, time) projection of an active appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedSlot {
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub time: TimeSlot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Confirmed,
    Pending,
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Confirmed,
        AppointmentStatus::Pending,
        AppointmentStatus::Scheduled,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Cancelled appointments do not hold their slot.
    pub fn is_active(&self) -> bool {
        *self != AppointmentStatus::Cancelled
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }
}

/// Admin console listing filter. Search is case-insensitive over patient,
/// doctor, and specialty.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub search: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<usize>,
}

impl AppointmentFilter {
    pub fn matches(&self, appt: &Appointment) -> bool {
        if let Some(status) = self.status {
            if appt.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                appt.patient_name.to_lowercase().contains(&term)
                    || appt.doctor_name.to_lowercase().contains(&term)
                    || appt.specialty.to_lowercase().contains(&term)
            }
        }
    }

    pub fn apply(&self, mut appts: Vec<Appointment>) -> Vec<Appointment> {
        appts.retain(|a| self.matches(a));
        if let Some(limit) = self.limit {
            appts.truncate(limit);
        }
        appts
    }
}

/// Splits into (upcoming ascending, past most-recent-first).
pub fn partition_by_date(
    appts: Vec<Appointment>,
    today: NaiveDate,
) -> (Vec<Appointment>, Vec<Appointment>) {
    let (mut upcoming, mut past): (Vec<_>, Vec<_>) =
        appts.into_iter().partition(|a| a.is_upcoming(today));
    upcoming.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
    past.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));
    (upcoming, past)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appt(patient: &str, doctor: &str, date: &str, time: &str, status: AppointmentStatus) -> Appointment {
        let now = chrono::Utc::now().naive_utc();
        Appointment {
            id: AppointmentId::generate(),
            user_id: UserId("u1".to_string()),
            patient_name: patient.to_string(),
            doctor_id: DoctorId(1),
            doctor_name: doctor.to_string(),
            specialty: "Cardiologist".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: TimeSlot::parse(time).unwrap(),
            status,
            location: "Cardiologist Office".to_string(),
            reason: "checkup".to_string(),
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_parse_round_trip_names() {
        for status in AppointmentStatus::ALL {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("cancelled"), Some(AppointmentStatus::Cancelled));
        assert_eq!(AppointmentStatus::parse("Rescheduled"), None);
    }

    #[test]
    fn test_only_cancelled_is_inactive() {
        assert!(!AppointmentStatus::Cancelled.is_active());
        assert!(AppointmentStatus::Completed.is_active());
        assert!(AppointmentStatus::Pending.is_active());
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let a = appt("Jane Doe", "Dr. Michael Chen", "2030-01-07", "9:00 AM", AppointmentStatus::Confirmed);
        let filter = AppointmentFilter {
            search: Some("CHEN".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&a));
        let filter = AppointmentFilter {
            search: Some("cardio".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&a));
        let filter = AppointmentFilter {
            search: Some("kim".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&a));
    }

    #[test]
    fn test_partition_by_date() {
        let today = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let appts = vec![
            appt("A", "Dr. X", "2030-01-09", "9:00 AM", AppointmentStatus::Confirmed),
            appt("B", "Dr. X", "2030-01-08", "1:00 PM", AppointmentStatus::Pending),
            appt("C", "Dr. X", "2030-01-10", "9:00 AM", AppointmentStatus::Cancelled),
            appt("D", "Dr. X", "2030-01-01", "9:00 AM", AppointmentStatus::Confirmed),
            appt("E", "Dr. X", "2030-01-03", "9:00 AM", AppointmentStatus::Completed),
        ];
        let (upcoming, past) = partition_by_date(appts, today);
        let up: Vec<&str> = upcoming.iter().map(|a| a.patient_name.as_str()).collect();
        let pa: Vec<&str> = past.iter().map(|a| a.patient_name.as_str()).collect();
        assert_eq!(up, vec!["B", "A"]);
        assert_eq!(pa, vec!["C", "E", "D"]);
    }
}
