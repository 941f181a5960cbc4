use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::DoctorId;
use super::user::Role;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub recipients: String,
    pub sent_by: String,
    pub sent_date: String,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    /// Admins see anything addressed to admin staff; patients see anything
    /// addressed to a patient group.
    pub fn visible_to(&self, role: Role) -> bool {
        match role {
            Role::Admin => self.recipients.contains("Admin"),
            Role::User => {
                self.recipients.contains("All Patients") || self.recipients.contains("Patients")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Audience {
    AllPatients,
    UpcomingPatients,
    NewPatients,
    DoctorPatients(DoctorId),
    AdminStaff,
}

#[derive(Clone, Debug)]
pub struct RecipientGroup {
    pub id: i64,
    pub name: String,
    pub audience: Audience,
}

impl RecipientGroup {
    pub fn label(&self, count: usize) -> String {
        format!("{} ({})", self.name, count)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NotificationTemplate {
    pub id: i64,
    pub title: &'static str,
    pub message: &'static str,
}

pub const TEMPLATES: [NotificationTemplate; 3] = [
    NotificationTemplate {
        id: 1,
        title: "Appointment Reminder",
        message: "This is a reminder for your upcoming appointment on [DATE] at [TIME] with [DOCTOR]. Please arrive 15 minutes before your scheduled time.",
    },
    NotificationTemplate {
        id: 2,
        title: "Schedule Change",
        message: "We regret to inform you that your appointment on [DATE] at [TIME] with [DOCTOR] needs to be rescheduled due to unforeseen circumstances. Please contact the clinic to arrange a new time.",
    },
    NotificationTemplate {
        id: 3,
        title: "Holiday Hours",
        message: "Please note that our clinic will be operating on modified hours during the upcoming holiday: [HOLIDAY_DETAILS]. For emergencies, please call our 24/7 hotline.",
    },
];

impl NotificationTemplate {
    pub fn find(id: i64) -> Option<&'static NotificationTemplate> {
        TEMPLATES.iter().find(|t| t.id == id)
    }

    /// Replaces `[KEY]` placeholders in one pass over the template, so
    /// substituted text is never expanded again. Keys are matched
    /// case-insensitively; placeholders without a value stay as written.
    pub fn render(&self, values: &HashMap<String, String>) -> String {
        let lookup: HashMap<String, &str> = values
            .iter()
            .map(|(k, v)| (k.trim().to_uppercase(), v.as_str()))
            .collect();

        let mut out = String::with_capacity(self.message.len());
        let mut rest = self.message;
        while let Some(open) = rest.find('[') {
            out.push_str(&rest[..open]);
            let token = &rest[open..];
            match token.find(']') {
                Some(close) => {
                    let key = &token[1..close];
                    match lookup.get(&key.to_uppercase()) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&token[..=close]),
                    }
                    rest = &token[close + 1..];
                }
                None => {
                    out.push_str(token);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}
