use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::{BookedSlot, Doctor, DoctorId, TimeSlot};
use crate::store::AppointmentStore;

/// Clinic-wide booking switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingPolicy {
    /// When false, Saturdays and Sundays are never bookable even if a doctor
    /// lists them as working days.
    pub allow_weekends: bool,
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Availability rule: the doctor works that weekday, the date is not in the
/// past, and it is not a weekend (unless the policy allows weekends).
pub fn is_date_available(
    doctor: &Doctor,
    date: NaiveDate,
    today: NaiveDate,
    policy: BookingPolicy,
) -> bool {
    if date < today {
        return false;
    }
    if !policy.allow_weekends && is_weekend(date) {
        return false;
    }
    doctor.accepted_days().contains(&date.weekday())
}

/// Dates in `[from, from + days)` that pass the availability rule. The window
/// is cut short at the end of the calendar.
pub fn bookable_dates(
    doctor: &Doctor,
    from: NaiveDate,
    days: u32,
    today: NaiveDate,
    policy: BookingPolicy,
) -> Vec<NaiveDate> {
    from.iter_days()
        .take(days as usize)
        .filter(|date| is_date_available(doctor, *date, today, policy))
        .collect()
}

/// Conflict rule: taken iff some booking matches doctor, date, and slot exactly.
pub fn is_slot_booked(
    doctor_id: DoctorId,
    date: NaiveDate,
    time: TimeSlot,
    booked: &[BookedSlot],
) -> bool {
    booked
        .iter()
        .any(|b| b.doctor_id == doctor_id && b.date == date && b.time == time)
}

/// The fixed slot list in order, minus the taken ones.
pub fn available_slots(doctor_id: DoctorId, date: NaiveDate, booked: &[BookedSlot]) -> Vec<TimeSlot> {
    TimeSlot::all()
        .filter(|slot| !is_slot_booked(doctor_id, date, *slot, booked))
        .collect()
}

/// Booked slots for display purposes. A store failure is logged and treated
/// as "nothing booked"; inserts are still guarded by the store itself.
pub async fn load_booked_slots_or_empty(
    store: &dyn AppointmentStore,
    doctor_id: DoctorId,
    date: NaiveDate,
) -> Vec<BookedSlot> {
    match store.booked_slots(doctor_id, date).await {
        Ok(slots) => slots,
        Err(e) => {
            tracing::warn!(doctor_id = %doctor_id, %date, error = %e, "failed to load booked slots, showing all as free");
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::{ScheduleEntry, ScheduleStatus};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn doctor(days: &[Weekday]) -> Doctor {
        Doctor {
            id: DoctorId(1),
            name: "Dr. Sarah Johnson".to_string(),
            specialty: "General Practitioner".to_string(),
            schedules: days
                .iter()
                .enumerate()
                .map(|(i, d)| ScheduleEntry {
                    id: i as i64 + 1,
                    day: *d,
                    start_time: "09:00".to_string(),
                    end_time: "17:00".to_string(),
                    status: ScheduleStatus::Available,
                })
                .collect(),
        }
    }

    fn johnson() -> Doctor {
        doctor(&[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Fri])
    }

    fn booked(time: &str) -> BookedSlot {
        BookedSlot {
            doctor_id: DoctorId(1),
            date: date("2024-03-18"),
            time: TimeSlot::parse(time).unwrap(),
        }
    }

    const TODAY: &str = "2024-03-01";

    #[test]
    fn test_weekday_outside_schedule_unavailable() {
        // 2024-03-21 is a Thursday
        assert!(!is_date_available(&johnson(), date("2024-03-21"), date(TODAY), BookingPolicy::default()));
        assert!(is_date_available(&johnson(), date("2024-03-18"), date(TODAY), BookingPolicy::default()));
    }

    #[test]
    fn test_weekends_never_available_by_default() {
        let everyday = doctor(&[
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]);
        let from = date(TODAY);
        for offset in 0..28 {
            let d = from + Duration::days(offset);
            let available = is_date_available(&everyday, d, from, BookingPolicy::default());
            assert_eq!(available, !is_weekend(d), "{d}");
        }
    }

    #[test]
    fn test_policy_can_allow_weekends() {
        let saturday_doc = doctor(&[Weekday::Sat]);
        let policy = BookingPolicy { allow_weekends: true };
        // 2024-03-16 is a Saturday
        assert!(is_date_available(&saturday_doc, date("2024-03-16"), date(TODAY), policy));
        assert!(!is_date_available(&saturday_doc, date("2024-03-16"), date(TODAY), BookingPolicy::default()));
    }

    #[test]
    fn test_past_dates_unavailable() {
        let today = date("2024-03-20");
        assert!(!is_date_available(&johnson(), date("2024-03-18"), today, BookingPolicy::default()));
        assert!(is_date_available(&johnson(), today, today, BookingPolicy::default()));
    }

    #[test]
    fn test_unavailable_entries_do_not_count() {
        let mut doc = johnson();
        for entry in doc.schedules.iter_mut() {
            if entry.day == Weekday::Mon {
                entry.status = ScheduleStatus::Unavailable;
            }
        }
        assert!(!is_date_available(&doc, date("2024-03-18"), date(TODAY), BookingPolicy::default()));
    }

    #[test]
    fn test_no_bookings_all_fourteen_slots() {
        let slots = available_slots(DoctorId(1), date("2024-03-18"), &[]);
        assert_eq!(slots.len(), 14);
        assert_eq!(slots, TimeSlot::all().collect::<Vec<_>>());
    }

    #[test]
    fn test_one_booking_removes_exactly_that_slot() {
        let slots = available_slots(DoctorId(1), date("2024-03-18"), &[booked("10:00 AM")]);
        assert_eq!(slots.len(), 13);
        assert!(!slots.contains(&TimeSlot::parse("10:00 AM").unwrap()));
        let mut expected: Vec<TimeSlot> = TimeSlot::all().collect();
        expected.retain(|s| s.label() != "10:00 AM");
        assert_eq!(slots, expected);
    }

    #[test]
    fn test_bookings_for_other_doctor_or_date_ignored() {
        let other_doctor = BookedSlot {
            doctor_id: DoctorId(2),
            ..booked("9:00 AM")
        };
        let other_date = BookedSlot {
            date: date("2024-03-19"),
            ..booked("9:30 AM")
        };
        let slots = available_slots(DoctorId(1), date("2024-03-18"), &[other_doctor, other_date]);
        assert_eq!(slots.len(), 14);
    }

    #[test]
    fn test_available_slots_is_idempotent() {
        let taken = [booked("9:00 AM"), booked("4:30 PM"), booked("1:00 PM")];
        let first = available_slots(DoctorId(1), date("2024-03-18"), &taken);
        let second = available_slots(DoctorId(1), date("2024-03-18"), &taken);
        assert_eq!(first, second);
        assert_eq!(first.len(), 11);
    }

    #[test]
    fn test_bookable_dates_horizon() {
        // Mon 2024-03-18 .. Sun 2024-03-24
        let dates = bookable_dates(&johnson(), date("2024-03-18"), 7, date(TODAY), BookingPolicy::default());
        assert_eq!(
            dates,
            vec![date("2024-03-18"), date("2024-03-19"), date("2024-03-20"), date("2024-03-22")]
        );
    }

    #[test]
    fn test_bookable_dates_stop_at_calendar_end() {
        let everyday = doctor(&[
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]);
        let from = NaiveDate::MAX - Duration::days(1);
        let dates = bookable_dates(&everyday, from, 30, date(TODAY), BookingPolicy::default());
        assert!(dates.len() <= 2);
        assert!(dates.iter().all(|d| *d >= from));
    }
}
