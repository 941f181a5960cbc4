use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::notification::TEMPLATES;
use crate::models::{
    AppointmentFilter, Audience, DoctorId, Notification, NotificationTemplate, RecipientGroup,
    Role, User,
};
use crate::state::AppState;

const DOCTOR_GROUP_OFFSET: i64 = 10;
const NEW_PATIENT_WINDOW_DAYS: i64 = 30;

/// Fixed groups first, then one group per doctor on the roster.
pub fn recipient_groups(conn: &rusqlite::Connection) -> anyhow::Result<Vec<RecipientGroup>> {
    let mut groups = vec![
        RecipientGroup {
            id: 1,
            name: "All Patients".to_string(),
            audience: Audience::AllPatients,
        },
        RecipientGroup {
            id: 2,
            name: "Patients with Upcoming Appointments".to_string(),
            audience: Audience::UpcomingPatients,
        },
        RecipientGroup {
            id: 3,
            name: "New Patients (Last 30 Days)".to_string(),
            audience: Audience::NewPatients,
        },
        RecipientGroup {
            id: 4,
            name: "Admin".to_string(),
            audience: Audience::AdminStaff,
        },
    ];

    for doctor in queries::list_doctors(conn)? {
        groups.push(RecipientGroup {
            id: DOCTOR_GROUP_OFFSET + doctor.id.0,
            name: format!("{}'s Patients", doctor.short_name()),
            audience: Audience::DoctorPatients(doctor.id),
        });
    }
    Ok(groups)
}

/// Number of users a group currently reaches.
pub async fn audience_size(
    state: &AppState,
    audience: &Audience,
    today: NaiveDate,
) -> Result<usize, AppError> {
    let count = match audience {
        Audience::AllPatients => {
            let conn = state.conn()?;
            queries::count_users(&conn, Role::User)? as usize
        }
        Audience::AdminStaff => {
            let conn = state.conn()?;
            queries::count_users(&conn, Role::Admin)? as usize
        }
        Audience::NewPatients => {
            let since = Utc::now().naive_utc() - Duration::days(NEW_PATIENT_WINDOW_DAYS);
            let conn = state.conn()?;
            queries::count_users_created_since(&conn, Role::User, &since)? as usize
        }
        Audience::UpcomingPatients => {
            let appts = state
                .appointments
                .list_all(&AppointmentFilter::default())
                .await?;
            appts
                .iter()
                .filter(|a| a.is_upcoming(today))
                .map(|a| &a.user_id)
                .collect::<HashSet<_>>()
                .len()
        }
        Audience::DoctorPatients(doctor_id) => {
            let appts = state
                .appointments
                .list_all(&AppointmentFilter::default())
                .await?;
            appts
                .iter()
                .filter(|a| a.doctor_id == *doctor_id && a.status.is_active())
                .map(|a| &a.user_id)
                .collect::<HashSet<_>>()
                .len()
        }
    };
    Ok(count)
}

#[derive(Debug, Serialize)]
pub struct GroupSummary {
    pub id: i64,
    pub name: String,
    pub count: usize,
}

pub async fn list_groups(state: &AppState, today: NaiveDate) -> Result<Vec<GroupSummary>, AppError> {
    let groups = {
        let conn = state.conn()?;
        recipient_groups(&conn)?
    };

    let mut summaries = Vec::with_capacity(groups.len());
    for group in groups {
        let count = audience_size(state, &group.audience, today).await?;
        summaries.push(GroupSummary {
            id: group.id,
            name: group.name,
            count,
        });
    }
    Ok(summaries)
}

/// Stores a notification and pushes it to live subscribers.
pub fn publish(
    state: &AppState,
    title: &str,
    message: &str,
    recipients: &str,
    sent_by: &str,
) -> anyhow::Result<Notification> {
    let notification = {
        let conn = state.conn()?;
        queries::insert_notification(&conn, title, message, recipients, sent_by)?
    };

    // No subscribers is not an error.
    let _ = state.notify_tx.send(notification.clone());
    tracing::info!(id = notification.id, recipients = %recipients, "notification published");
    Ok(notification)
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub recipient_group_id: Option<i64>,
}

pub async fn send(
    state: &AppState,
    sender: &User,
    req: SendRequest,
    today: NaiveDate,
) -> Result<Notification, AppError> {
    let title = req.title.trim();
    let message = req.message.trim();
    let Some(group_id) = req.recipient_group_id else {
        return Err(AppError::Validation("Please fill in all required fields".to_string()));
    };
    if title.is_empty() || message.is_empty() {
        return Err(AppError::Validation("Please fill in all required fields".to_string()));
    }

    let group = {
        let conn = state.conn()?;
        recipient_groups(&conn)?
            .into_iter()
            .find(|g| g.id == group_id)
            .ok_or_else(|| AppError::Validation(format!("Unknown recipient group: {group_id}")))?
    };

    let count = audience_size(state, &group.audience, today).await?;
    Ok(publish(state, title, message, &group.label(count), &sender.name)?)
}

/// Notifications addressed to the user's role, newest first, after `since_id`.
pub fn feed_for(state: &AppState, user: &User, since_id: i64) -> Result<Vec<Notification>, AppError> {
    let conn = state.conn()?;
    let all = queries::list_notifications_for_user(&conn, &user.id, since_id)?;
    Ok(all.into_iter().filter(|n| n.visible_to(user.role)).collect())
}

pub fn mark_read(state: &AppState, user: &User, id: i64) -> Result<(), AppError> {
    let conn = state.conn()?;
    match queries::get_notification(&conn, id)? {
        Some(n) if n.visible_to(user.role) => {
            queries::mark_notification_read(&conn, id, &user.id)?;
            Ok(())
        }
        _ => Err(AppError::NotFound(format!("notification {id}"))),
    }
}

pub fn templates() -> &'static [NotificationTemplate] {
    &TEMPLATES
}

pub fn render_template(id: i64, values: &HashMap<String, String>) -> Result<String, AppError> {
    NotificationTemplate::find(id)
        .map(|t| t.render(values))
        .ok_or_else(|| AppError::NotFound(format!("template {id}")))
}

pub fn doctor_group_id(doctor_id: DoctorId) -> i64 {
    DOCTOR_GROUP_OFFSET + doctor_id.0
}
