use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{AppointmentStore, StoreError};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentId, AppointmentStatus, BookedSlot, DoctorId,
    NewAppointment, TimeSlot, UserId,
};

/// Appointments kept in a hosted PostgREST-style table at
/// `{base_url}/rest/v1/appointments`.
pub struct RestTableStore {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RestTableStore {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/appointments", self.base_url)
    }

    fn headers(&self) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| StoreError::Unavailable("api key is not a valid header value".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| StoreError::Unavailable("api key is not a valid header value".to_string()))?;
        headers.insert("apikey", key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn request(&self, method: Method) -> Result<RequestBuilder, StoreError> {
        Ok(self
            .client
            .request(method, self.table_url())
            .headers(self.headers()?))
    }

    async fn fetch_rows(&self, req: RequestBuilder) -> Result<Vec<AppointmentRow>, StoreError> {
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::CONFLICT {
            return Err(StoreError::Duplicate);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "appointment table request failed");
            return Err(StoreError::Backend(anyhow::anyhow!(
                "appointment table returned {status}: {body}"
            )));
        }

        let rows: Vec<AppointmentRow> = resp
            .json()
            .await
            .context("failed to parse appointment table response")?;
        Ok(rows)
    }

    async fn fetch(&self, req: RequestBuilder) -> Result<Vec<Appointment>, StoreError> {
        self.fetch_rows(req)
            .await?
            .into_iter()
            .map(AppointmentRow::into_appointment)
            .collect()
    }
}

/// Row shape as the hosted table returns it. Timestamps may arrive as
/// RFC 3339 or as plain `YYYY-MM-DD HH:MM:SS`, and older rows lack some columns.
#[derive(Debug, Deserialize)]
struct AppointmentRow {
    id: String,
    user_id: String,
    #[serde(default)]
    patient_name: String,
    doctor_id: i64,
    #[serde(default)]
    doctor_name: String,
    #[serde(default)]
    specialty: String,
    date: NaiveDate,
    time: String,
    status: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

fn parse_lenient_ts(s: Option<&str>) -> NaiveDateTime {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.naive_utc())
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
    })
    .unwrap_or_else(|| Utc::now().naive_utc())
}

impl AppointmentRow {
    fn into_appointment(self) -> Result<Appointment, StoreError> {
        let time = TimeSlot::parse(&self.time).ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!("unknown time slot in row {}: {}", self.id, self.time))
        })?;
        let status = AppointmentStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!("unknown status in row {}: {}", self.id, self.status))
        })?;
        let created_at = parse_lenient_ts(self.created_at.as_deref());
        let updated_at = self
            .updated_at
            .as_deref()
            .map(|s| parse_lenient_ts(Some(s)))
            .unwrap_or(created_at);

        Ok(Appointment {
            id: AppointmentId(self.id),
            user_id: UserId(self.user_id),
            patient_name: self.patient_name,
            doctor_id: DoctorId(self.doctor_id),
            doctor_name: self.doctor_name,
            specialty: self.specialty,
            date: self.date,
            time,
            status,
            location: self.location,
            reason: self.reason,
            note: self.note,
            created_at,
            updated_at,
        })
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

#[async_trait]
impl AppointmentStore for RestTableStore {
    async fn insert(&self, new: &NewAppointment) -> Result<Appointment, StoreError> {
        let req = self
            .request(Method::POST)?
            .header("Prefer", "return=representation")
            .json(new);

        self.fetch(req)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("insert returned no rows")))
    }

    async fn booked_slots(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
    ) -> Result<Vec<BookedSlot>, StoreError> {
        let req = self.request(Method::GET)?.query(&[
            ("select", "doctor_id,date,time".to_string()),
            ("doctor_id", eq(doctor_id)),
            ("date", eq(date.format("%Y-%m-%d"))),
            ("status", "neq.Cancelled".to_string()),
        ]);

        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "appointment table returned {}",
                resp.status()
            )));
        }

        #[derive(Deserialize)]
        struct SlotRow {
            doctor_id: i64,
            date: NaiveDate,
            time: String,
        }

        let rows: Vec<SlotRow> = resp
            .json()
            .await
            .context("failed to parse booked slots")?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let time = TimeSlot::parse(&row.time);
                if time.is_none() {
                    tracing::warn!(doctor_id = row.doctor_id, time = %row.time, "skipping booking with unknown slot");
                }
                time.map(|time| BookedSlot {
                    doctor_id: DoctorId(row.doctor_id),
                    date: row.date,
                    time,
                })
            })
            .collect())
    }

    async fn get(&self, id: &AppointmentId) -> Result<Option<Appointment>, StoreError> {
        let req = self
            .request(Method::GET)?
            .query(&[("select", "*".to_string()), ("id", eq(id))]);
        Ok(self.fetch(req).await?.into_iter().next())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Appointment>, StoreError> {
        let req = self.request(Method::GET)?.query(&[
            ("select", "*".to_string()),
            ("user_id", eq(user_id)),
            ("order", "date.asc".to_string()),
        ]);
        self.fetch(req).await
    }

    async fn list_all(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "date.desc".to_string()),
        ];
        if let Some(status) = filter.status {
            query.push(("status", eq(status.as_str())));
        }
        let req = self.request(Method::GET)?.query(&query);
        // Search spans three columns and is applied locally.
        Ok(filter.apply(self.fetch(req).await?))
    }

    async fn update_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
        note: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut body = json!({
            "status": status.as_str(),
            "updated_at": now_rfc3339(),
        });
        if let Some(note) = note {
            body["note"] = json!(note);
        }

        let req = self
            .request(Method::PATCH)?
            .query(&[("id", eq(id))])
            .header("Prefer", "return=representation")
            .json(&body);
        Ok(!self.fetch_rows(req).await?.is_empty())
    }

    async fn reschedule(
        &self,
        id: &AppointmentId,
        date: NaiveDate,
        time: TimeSlot,
    ) -> Result<bool, StoreError> {
        let body = json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "time": time.label(),
            "updated_at": now_rfc3339(),
        });

        let req = self
            .request(Method::PATCH)?
            .query(&[("id", eq(id))])
            .header("Prefer", "return=representation")
            .json(&body);
        Ok(!self.fetch_rows(req).await?.is_empty())
    }
}
