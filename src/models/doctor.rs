use chrono::Weekday;
use serde::Serialize;

use super::ids::DoctorId;
use super::schedule::{accepted_days, weekday_name, ScheduleEntry};

#[derive(Debug, Clone, Serialize)]
pub struct Doctor {
    pub id: DoctorId,
    pub name: String,
    pub specialty: String,
    pub schedules: Vec<ScheduleEntry>,
}

impl Doctor {
    pub fn accepted_days(&self) -> Vec<Weekday> {
        accepted_days(&self.schedules)
    }

    pub fn available_day_names(&self) -> Vec<&'static str> {
        self.accepted_days().into_iter().map(weekday_name).collect()
    }

    /// "Dr. Sarah Johnson" becomes "Dr. Johnson".
    pub fn short_name(&self) -> String {
        match self.name.split_whitespace().last() {
            Some(surname) if surname != "Dr." => format!("Dr. {surname}"),
            _ => self.name.trim().to_string(),
        }
    }

    /// Location label recorded on new appointments.
    pub fn office_location(&self) -> String {
        if self.specialty.trim().is_empty() {
            "Clinic".to_string()
        } else {
            format!("{} Office", self.specialty)
        }
    }
}
