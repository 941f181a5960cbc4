use chrono::NaiveDate;
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use serde_json::json;

use clinicbook::models::{
    AppointmentId, AppointmentStatus, DoctorId, NewAppointment, TimeSlot, UserId,
};
use clinicbook::store::{AppointmentStore, RestTableStore, StoreError};

fn store(server: &MockServer) -> RestTableStore {
    RestTableStore::new(server.base_url(), "test-key".to_string())
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 18).unwrap()
}

fn new_appointment() -> NewAppointment {
    NewAppointment {
        id: AppointmentId("a-1".to_string()),
        user_id: UserId("u-1".to_string()),
        patient_name: "Test User".to_string(),
        doctor_id: DoctorId(1),
        doctor_name: "Dr. Sarah Johnson".to_string(),
        specialty: "General Practitioner".to_string(),
        date: monday(),
        time: TimeSlot::parse("10:00 AM").unwrap(),
        status: AppointmentStatus::Confirmed,
        location: "General Practitioner Office".to_string(),
        reason: "Checkup".to_string(),
    }
}

fn row() -> serde_json::Value {
    json!({
        "id": "a-1",
        "user_id": "u-1",
        "patient_name": "Test User",
        "doctor_id": 1,
        "doctor_name": "Dr. Sarah Johnson",
        "specialty": "General Practitioner",
        "date": "2030-03-18",
        "time": "10:00 AM",
        "status": "Confirmed",
        "location": "General Practitioner Office",
        "reason": "Checkup",
        "created_at": "2030-03-01 08:00:00"
    })
}

#[tokio::test]
async fn test_insert_returns_stored_row() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/appointments")
                .header("apikey", "test-key")
                .header("Authorization", "Bearer test-key")
                .header("Prefer", "return=representation");
            then.status(201).json_body(json!([row()]));
        })
        .await;

    let appt = store(&server).insert(&new_appointment()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(appt.id, AppointmentId("a-1".to_string()));
    assert_eq!(appt.time.label(), "10:00 AM");
    assert_eq!(appt.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn test_insert_conflict_maps_to_duplicate() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rest/v1/appointments");
            then.status(409).json_body(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint"
            }));
        })
        .await;

    let err = store(&server).insert(&new_appointment()).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate));
}

#[tokio::test]
async fn test_booked_slots_filters_out_cancelled() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/appointments")
                .query_param("doctor_id", "eq.1")
                .query_param("date", "eq.2030-03-18")
                .query_param("status", "neq.Cancelled");
            then.status(200).json_body(json!([
                {"doctor_id": 1, "date": "2030-03-18", "time": "9:00 AM"},
                {"doctor_id": 1, "date": "2030-03-18", "time": "2:30 PM"},
                {"doctor_id": 1, "date": "2030-03-18", "time": "12:15 PM"}
            ]));
        })
        .await;

    let slots = store(&server).booked_slots(DoctorId(1), monday()).await.unwrap();

    mock.assert_async().await;
    let labels: Vec<&str> = slots.iter().map(|s| s.time.label()).collect();
    assert_eq!(labels, vec!["9:00 AM", "2:30 PM"]);
}

#[tokio::test]
async fn test_server_error_is_backend_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/appointments");
            then.status(500).body("boom");
        })
        .await;

    let err = store(&server)
        .get(&AppointmentId("a-1".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
}

#[tokio::test]
async fn test_unreachable_table_is_unavailable() {
    let store = RestTableStore::new("http://127.0.0.1:1".to_string(), "k".to_string());
    let err = store.booked_slots(DoctorId(1), monday()).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[tokio::test]
async fn test_update_status_reports_missing_row() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/appointments")
                .query_param("id", "eq.missing")
                .json_body_partial(r#"{"status": "Completed"}"#);
            then.status(200).json_body(json!([]));
        })
        .await;

    let updated = store(&server)
        .update_status(
            &AppointmentId("missing".to_string()),
            AppointmentStatus::Completed,
            None,
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(!updated);
}
