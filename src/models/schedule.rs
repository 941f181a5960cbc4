use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bookable half-hour markers. The midday break (12:00-1:00) is not bookable.
pub const TIME_SLOT_LABELS: [&str; 14] = [
    "9:00 AM", "9:30 AM", "10:00 AM", "10:30 AM", "11:00 AM", "11:30 AM", "1:00 PM", "1:30 PM",
    "2:00 PM", "2:30 PM", "3:00 PM", "3:30 PM", "4:00 PM", "4:30 PM",
];

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// One of the fixed slot labels. Ordering follows the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot(u8);

impl TimeSlot {
    pub fn all() -> impl Iterator<Item = TimeSlot> + Clone {
        (0..TIME_SLOT_LABELS.len() as u8).map(TimeSlot)
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        TIME_SLOT_LABELS
            .iter()
            .position(|label| label.eq_ignore_ascii_case(s))
            .map(|i| TimeSlot(i as u8))
    }

    pub fn label(&self) -> &'static str {
        TIME_SLOT_LABELS[self.0 as usize]
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TimeSlot::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("unknown time slot: {s}")))
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Accepts full names ("Monday") and three-letter forms ("mon"), any case.
pub fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    let lower = s.trim().to_lowercase();
    WEEK.iter()
        .copied()
        .find(|d| {
            let name = weekday_name(*d).to_lowercase();
            name == lower || name[..3] == lower
        })
        .ok_or_else(|| anyhow::anyhow!("invalid weekday: {s}"))
}

pub mod weekday_serde {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(super::weekday_name(*day))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_weekday(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScheduleStatus {
    Available,
    Unavailable,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Available => "Available",
            ScheduleStatus::Unavailable => "Unavailable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(ScheduleStatus::Available),
            "Unavailable" => Some(ScheduleStatus::Unavailable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: i64,
    #[serde(with = "weekday_serde")]
    pub day: Weekday,
    pub start_time: String,
    pub end_time: String,
    pub status: ScheduleStatus,
}

impl ScheduleEntry {
    pub fn validate_hours(start: &str, end: &str) -> anyhow::Result<()> {
        parse_time(start)?;
        parse_time(end)?;
        if start >= end {
            anyhow::bail!("start time {start} must be before end time {end}");
        }
        Ok(())
    }
}

/// Distinct weekdays covered by `Available` entries, Monday first.
pub fn accepted_days(entries: &[ScheduleEntry]) -> Vec<Weekday> {
    WEEK.iter()
        .copied()
        .filter(|day| {
            entries
                .iter()
                .any(|e| e.day == *day && e.status == ScheduleStatus::Available)
        })
        .collect()
}

/// `HH:MM`, zero-padded, 24-hour.
fn parse_time(s: &str) -> anyhow::Result<()> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 || parts[0].len() != 2 || parts[1].len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    if hour > 23 || minute > 59 {
        return Err(anyhow::anyhow!("time out of range: {s}"));
    }
    Ok(())
}
