use chrono::Weekday;
use rusqlite::Connection;

use super::queries;
use crate::models::{ScheduleEntry, ScheduleStatus};

const ROSTER: &[(&str, &str, &[Weekday])] = &[
    (
        "Dr. Sarah Johnson",
        "General Practitioner",
        &[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Fri],
    ),
    ("Dr. Michael Chen", "Cardiologist", &[Weekday::Mon, Weekday::Thu]),
    (
        "Dr. Emily Rodriguez",
        "Pediatrician",
        &[Weekday::Tue, Weekday::Wed, Weekday::Thu],
    ),
    ("Dr. David Kim", "Dermatologist", &[Weekday::Mon, Weekday::Fri]),
    (
        "Dr. Lisa Patel",
        "Neurologist",
        &[Weekday::Wed, Weekday::Thu, Weekday::Fri],
    ),
];

/// Inserts the default roster into an empty doctors table. Returns how many
/// doctors were added.
pub fn seed_doctors(conn: &Connection) -> anyhow::Result<usize> {
    if queries::count_doctors(conn)? > 0 {
        return Ok(0);
    }

    for (name, specialty, days) in ROSTER {
        let doctor_id = queries::insert_doctor(conn, name, specialty)?;
        for day in *days {
            let entry = ScheduleEntry {
                id: 0,
                day: *day,
                start_time: "09:00".to_string(),
                end_time: "17:00".to_string(),
                status: ScheduleStatus::Available,
            };
            queries::insert_schedule(conn, doctor_id, &entry)?;
        }
    }

    tracing::info!(count = ROSTER.len(), "seeded doctor roster");
    Ok(ROSTER.len())
}
