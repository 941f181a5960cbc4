use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Appointment, AppointmentId, AppointmentStatus, BookedSlot, Doctor, DoctorId, NewAppointment,
    Notification, Role, ScheduleEntry, ScheduleStatus, TimeSlot, User, UserId, UserSettings,
};
use crate::models::schedule::{parse_weekday, weekday_name};

pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn now_str() -> String {
    Utc::now().naive_utc().format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Users ──

pub struct Credentials {
    pub user: User,
    pub password_digest: String,
    pub password_salt: String,
}

const USER_COLUMNS: &str = "id, name, email, role, settings, created_at";

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let id: String = row.get(0)?;
    let role_str: String = row.get(3)?;
    let settings_json: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;

    let settings = UserSettings::from_json(&settings_json).unwrap_or_else(|e| {
        tracing::warn!(user_id = %id, error = %e, "unreadable user settings, using defaults");
        UserSettings::default()
    });

    Ok(User {
        id: UserId(id),
        name: row.get(1)?,
        email: row.get(2)?,
        role: Role::parse(&role_str).unwrap_or(Role::User),
        settings,
        created_at: parse_ts(&created_at_str),
    })
}

pub fn create_user(
    conn: &Connection,
    user: &User,
    password_digest: &str,
    password_salt: &str,
) -> anyhow::Result<()> {
    let settings = serde_json::to_string(&user.settings)?;
    conn.execute(
        "INSERT INTO users (id, name, email, password_digest, password_salt, role, settings, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.as_str(),
            user.name,
            user.email,
            password_digest,
            password_salt,
            user.role.as_str(),
            settings,
            user.created_at.format(TS_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &UserId) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.as_str()],
        |row| Ok(parse_user_row(row)),
    );

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_credentials_by_email(
    conn: &Connection,
    email: &str,
) -> anyhow::Result<Option<Credentials>> {
    let result = conn.query_row(
        &format!(
            "SELECT {USER_COLUMNS}, password_digest, password_salt FROM users WHERE email = ?1"
        ),
        params![email.trim()],
        |row| {
            let digest: String = row.get(6)?;
            let salt: String = row.get(7)?;
            Ok(parse_user_row(row).map(|user| Credentials {
                user,
                password_digest: digest,
                password_salt: salt,
            }))
        },
    );

    match result {
        Ok(creds) => Ok(Some(creds?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Emails compare case-insensitively (column collation).
pub fn email_in_use(conn: &Connection, email: &str, except: Option<&UserId>) -> anyhow::Result<bool> {
    let except = except.map(|id| id.as_str()).unwrap_or("");
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1 AND id != ?2",
        params![email.trim(), except],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_users(conn: &Connection) -> anyhow::Result<Vec<User>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, name ASC"))?;
    let rows = stmt.query_map([], |row| Ok(parse_user_row(row)))?;

    let mut users = vec![];
    for row in rows {
        users.push(row??);
    }
    Ok(users)
}

pub fn update_user(conn: &Connection, user: &User) -> anyhow::Result<bool> {
    let settings = serde_json::to_string(&user.settings)?;
    let count = conn.execute(
        "UPDATE users SET name = ?1, email = ?2, role = ?3, settings = ?4 WHERE id = ?5",
        params![
            user.name,
            user.email,
            user.role.as_str(),
            settings,
            user.id.as_str()
        ],
    )?;
    Ok(count > 0)
}

pub fn update_password(
    conn: &Connection,
    id: &UserId,
    password_digest: &str,
    password_salt: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET password_digest = ?1, password_salt = ?2 WHERE id = ?3",
        params![password_digest, password_salt, id.as_str()],
    )?;
    Ok(count > 0)
}

pub fn delete_user(conn: &Connection, id: &UserId) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM users WHERE id = ?1", params![id.as_str()])?;
    Ok(count > 0)
}

pub fn count_users(conn: &Connection, role: Role) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1",
        params![role.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_users_created_since(
    conn: &Connection,
    role: Role,
    since: &NaiveDateTime,
) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1 AND created_at >= ?2",
        params![role.as_str(), since.format(TS_FORMAT).to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ── Sessions ──

pub fn create_session(
    conn: &Connection,
    token: &str,
    user_id: &UserId,
    expires_at: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![token, user_id.as_str(), expires_at.format(TS_FORMAT).to_string()],
    )?;
    Ok(())
}

pub fn get_session_user(conn: &Connection, token: &str) -> anyhow::Result<Option<User>> {
    let user_id: Option<String> = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > ?2",
            params![token, now_str()],
            |row| row.get(0),
        )
        .optional()?;

    match user_id {
        Some(id) => get_user(conn, &UserId(id)),
        None => Ok(None),
    }
}

pub fn delete_session(conn: &Connection, token: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(count > 0)
}

pub fn expire_old_sessions(conn: &Connection) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![now_str()],
    )?;
    Ok(count)
}

// ── Doctors & Schedules ──

pub fn insert_doctor(conn: &Connection, name: &str, specialty: &str) -> anyhow::Result<DoctorId> {
    conn.execute(
        "INSERT INTO doctors (name, specialty) VALUES (?1, ?2)",
        params![name, specialty],
    )?;
    Ok(DoctorId(conn.last_insert_rowid()))
}

pub fn count_doctors(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM doctors", [], |row| row.get(0))?;
    Ok(count)
}

fn parse_schedule_row(row: &rusqlite::Row) -> anyhow::Result<(DoctorId, ScheduleEntry)> {
    let id: i64 = row.get(0)?;
    let doctor_id: i64 = row.get(1)?;
    let day_str: String = row.get(2)?;
    let status_str: String = row.get(5)?;

    Ok((
        DoctorId(doctor_id),
        ScheduleEntry {
            id,
            day: parse_weekday(&day_str)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            status: ScheduleStatus::parse(&status_str).unwrap_or(ScheduleStatus::Unavailable),
        },
    ))
}

fn schedules_for(conn: &Connection, doctor_id: Option<DoctorId>) -> anyhow::Result<Vec<(DoctorId, ScheduleEntry)>> {
    let mut stmt = conn.prepare(
        "SELECT id, doctor_id, day, start_time, end_time, status FROM doctor_schedules
         WHERE ?1 IS NULL OR doctor_id = ?1
         ORDER BY doctor_id ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![doctor_id.map(|d| d.0)], |row| {
        Ok(parse_schedule_row(row))
    })?;

    let mut entries = vec![];
    for row in rows {
        entries.push(row??);
    }
    Ok(entries)
}

pub fn list_doctors(conn: &Connection) -> anyhow::Result<Vec<Doctor>> {
    let mut stmt = conn.prepare("SELECT id, name, specialty FROM doctors ORDER BY id ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Doctor {
            id: DoctorId(row.get(0)?),
            name: row.get(1)?,
            specialty: row.get(2)?,
            schedules: vec![],
        })
    })?;

    let mut doctors = vec![];
    for row in rows {
        doctors.push(row?);
    }

    for (doctor_id, entry) in schedules_for(conn, None)? {
        if let Some(doctor) = doctors.iter_mut().find(|d| d.id == doctor_id) {
            doctor.schedules.push(entry);
        }
    }
    Ok(doctors)
}

pub fn get_doctor(conn: &Connection, id: DoctorId) -> anyhow::Result<Option<Doctor>> {
    let doctor = conn
        .query_row(
            "SELECT id, name, specialty FROM doctors WHERE id = ?1",
            params![id.0],
            |row| {
                Ok(Doctor {
                    id: DoctorId(row.get(0)?),
                    name: row.get(1)?,
                    specialty: row.get(2)?,
                    schedules: vec![],
                })
            },
        )
        .optional()?;

    match doctor {
        Some(mut doctor) => {
            doctor.schedules = schedules_for(conn, Some(id))?
                .into_iter()
                .map(|(_, entry)| entry)
                .collect();
            Ok(Some(doctor))
        }
        None => Ok(None),
    }
}

pub fn insert_schedule(
    conn: &Connection,
    doctor_id: DoctorId,
    entry: &ScheduleEntry,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO doctor_schedules (doctor_id, day, start_time, end_time, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            doctor_id.0,
            weekday_name(entry.day),
            entry.start_time,
            entry.end_time,
            entry.status.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_schedule(conn: &Connection, id: i64) -> anyhow::Result<Option<(DoctorId, ScheduleEntry)>> {
    let result = conn.query_row(
        "SELECT id, doctor_id, day, start_time, end_time, status FROM doctor_schedules WHERE id = ?1",
        params![id],
        |row| Ok(parse_schedule_row(row)),
    );

    match result {
        Ok(entry) => Ok(Some(entry?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_schedule(conn: &Connection, entry: &ScheduleEntry) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE doctor_schedules SET day = ?1, start_time = ?2, end_time = ?3, status = ?4 WHERE id = ?5",
        params![
            weekday_name(entry.day),
            entry.start_time,
            entry.end_time,
            entry.status.as_str(),
            entry.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_schedule(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM doctor_schedules WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "id, user_id, patient_name, doctor_id, doctor_name, specialty, date, time, status, location, reason, note, created_at, updated_at";

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(6)?;
    let time_str: String = row.get(7)?;
    let status_str: String = row.get(8)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;

    Ok(Appointment {
        id: AppointmentId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        patient_name: row.get(2)?,
        doctor_id: DoctorId(row.get(3)?),
        doctor_name: row.get(4)?,
        specialty: row.get(5)?,
        date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)?,
        time: TimeSlot::parse(&time_str)
            .ok_or_else(|| anyhow::anyhow!("unknown time slot in appointments row: {time_str}"))?,
        status: AppointmentStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown appointment status: {status_str}"))?,
        location: row.get(9)?,
        reason: row.get(10)?,
        note: row.get(11)?,
        created_at: parse_ts(&created_at_str),
        updated_at: parse_ts(&updated_at_str),
    })
}

fn collect_appointments(
    stmt: &mut rusqlite::Statement,
    params: impl rusqlite::Params,
) -> anyhow::Result<Vec<Appointment>> {
    let rows = stmt.query_map(params, |row| Ok(parse_appointment_row(row)))?;
    let mut appts = vec![];
    for row in rows {
        appts.push(row??);
    }
    Ok(appts)
}

pub fn insert_appointment(conn: &Connection, new: &NewAppointment) -> anyhow::Result<Appointment> {
    let now = now_str();
    conn.execute(
        "INSERT INTO appointments (id, user_id, patient_name, doctor_id, doctor_name, specialty, date, time, status, location, reason, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL, ?12, ?12)",
        params![
            new.id.as_str(),
            new.user_id.as_str(),
            new.patient_name,
            new.doctor_id.0,
            new.doctor_name,
            new.specialty,
            new.date.format(DATE_FORMAT).to_string(),
            new.time.label(),
            new.status.as_str(),
            new.location,
            new.reason,
            now,
        ],
    )?;

    get_appointment(conn, &new.id)?
        .ok_or_else(|| anyhow::anyhow!("appointment {} vanished after insert", new.id))
}

pub fn get_booked_slots(
    conn: &Connection,
    doctor_id: DoctorId,
    date: NaiveDate,
) -> anyhow::Result<Vec<BookedSlot>> {
    let mut stmt = conn.prepare(
        "SELECT doctor_id, date, time FROM appointments
         WHERE doctor_id = ?1 AND date = ?2 AND status != 'Cancelled'",
    )?;
    let rows = stmt.query_map(
        params![doctor_id.0, date.format(DATE_FORMAT).to_string()],
        |row| {
            let doctor_id: i64 = row.get(0)?;
            let date_str: String = row.get(1)?;
            let time_str: String = row.get(2)?;
            Ok((doctor_id, date_str, time_str))
        },
    )?;

    let mut slots = vec![];
    for row in rows {
        let (doctor_id, date_str, time_str) = row?;
        let Some(time) = TimeSlot::parse(&time_str) else {
            tracing::warn!(doctor_id, time = %time_str, "skipping booking with unknown slot");
            continue;
        };
        slots.push(BookedSlot {
            doctor_id: DoctorId(doctor_id),
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)?,
            time,
        });
    }
    Ok(slots)
}

pub fn get_appointment(conn: &Connection, id: &AppointmentId) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
        params![id.as_str()],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appt) => Ok(Some(appt?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_appointments_for_user(conn: &Connection, user_id: &UserId) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE user_id = ?1 ORDER BY date ASC"
    ))?;
    collect_appointments(&mut stmt, params![user_id.as_str()])
}

pub fn list_appointments(
    conn: &Connection,
    status: Option<AppointmentStatus>,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE ?1 IS NULL OR status = ?1
         ORDER BY date DESC"
    ))?;
    collect_appointments(&mut stmt, params![status.map(|s| s.as_str())])
}

/// A `None` note keeps whatever note is already stored.
pub fn update_appointment_status(
    conn: &Connection,
    id: &AppointmentId,
    status: AppointmentStatus,
    note: Option<&str>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, note = COALESCE(?2, note), updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), note, now_str(), id.as_str()],
    )?;
    Ok(count > 0)
}

pub fn reschedule_appointment(
    conn: &Connection,
    id: &AppointmentId,
    date: NaiveDate,
    time: TimeSlot,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET date = ?1, time = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            date.format(DATE_FORMAT).to_string(),
            time.label(),
            now_str(),
            id.as_str()
        ],
    )?;
    Ok(count > 0)
}

// ── Notifications ──

fn parse_notification_row(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        title: row.get(1)?,
        message: row.get(2)?,
        recipients: row.get(3)?,
        sent_by: row.get(4)?,
        sent_date: row.get(5)?,
        read: row.get::<_, i32>(6)? != 0,
    })
}

pub fn insert_notification(
    conn: &Connection,
    title: &str,
    message: &str,
    recipients: &str,
    sent_by: &str,
) -> anyhow::Result<Notification> {
    let now = now_str();
    conn.execute(
        "INSERT INTO notifications (title, message, recipients, sent_by, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, message, recipients, sent_by, now],
    )?;
    Ok(Notification {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        message: message.to_string(),
        recipients: recipients.to_string(),
        sent_by: sent_by.to_string(),
        sent_date: now,
        read: false,
    })
}

/// Everything ever sent, newest first. `read` is always false here.
pub fn list_notifications(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, message, recipients, sent_by, created_at, 0
         FROM notifications ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], parse_notification_row)?;

    let mut notifications = vec![];
    for row in rows {
        notifications.push(row?);
    }
    Ok(notifications)
}

/// Notifications after `since_id`, newest first, with this user's read flag.
pub fn list_notifications_for_user(
    conn: &Connection,
    user_id: &UserId,
    since_id: i64,
) -> anyhow::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT n.id, n.title, n.message, n.recipients, n.sent_by, n.created_at,
                CASE WHEN r.user_id IS NULL THEN 0 ELSE 1 END
         FROM notifications n
         LEFT JOIN notification_reads r ON r.notification_id = n.id AND r.user_id = ?1
         WHERE n.id > ?2
         ORDER BY n.id DESC",
    )?;
    let rows = stmt.query_map(params![user_id.as_str(), since_id], parse_notification_row)?;

    let mut notifications = vec![];
    for row in rows {
        notifications.push(row?);
    }
    Ok(notifications)
}

pub fn get_notification(conn: &Connection, id: i64) -> anyhow::Result<Option<Notification>> {
    let notification = conn
        .query_row(
            "SELECT id, title, message, recipients, sent_by, created_at, 0 FROM notifications WHERE id = ?1",
            params![id],
            parse_notification_row,
        )
        .optional()?;
    Ok(notification)
}

pub fn mark_notification_read(conn: &Connection, id: i64, user_id: &UserId) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO notification_reads (notification_id, user_id) VALUES (?1, ?2)",
        params![id, user_id.as_str()],
    )?;
    Ok(())
}
