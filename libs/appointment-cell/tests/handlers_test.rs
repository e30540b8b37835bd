use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::{appointment_routes, InMemoryDirectory, InMemoryLedger, SchedulingState};
use doctor_cell::{AvailabilityService, DayOfWeek, DoctorAvailability, InMemoryAvailabilityRepository};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use shared_utils::{Clock, FixedClock};

const MONDAY: &str = "2026-03-02";

struct TestApp {
    router: Router,
    jwt_secret: String,
    doctor: TestUser,
}

impl TestApp {
    /// Doctor works Mondays 09:00-12:00; "today" is 2026-03-02 at 08:00.
    async fn new() -> Self {
        let config = TestConfig::default().to_arc();
        let availability = Arc::new(AvailabilityService::new(Arc::new(InMemoryAvailabilityRepository::new())));
        let directory = Arc::new(InMemoryDirectory::with_availability(Arc::clone(&availability)));
        let now = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));

        let doctor = TestUser::doctor("doc@example.com");
        availability
            .set_day(DoctorAvailability {
                doctor_id: doctor.uuid(),
                day: DayOfWeek::Monday,
                start_time: "09:00".parse().unwrap(),
                end_time: "12:00".parse().unwrap(),
                is_open: true,
            })
            .await
            .unwrap();

        let state = SchedulingState::new(
            Arc::clone(&config),
            availability,
            Arc::new(InMemoryLedger::new()),
            directory,
            clock,
        );

        Self {
            jwt_secret: config.supabase_jwt_secret.clone(),
            router: appointment_routes(Arc::new(state)),
            doctor,
        }
    }

    fn token_for(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.jwt_secret, Some(1))
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(&self, uri: String, user: &TestUser) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {}", self.token_for(user)))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn json(&self, method: &str, uri: String, user: &TestUser, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", self.token_for(user)))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn book(&self, patient: &TestUser, slot: &str) -> (StatusCode, Value) {
        let body = json!({
            "doctor_id": self.doctor.uuid(),
            "patient_id": patient.uuid(),
            "date": MONDAY,
            "time_slot": slot,
            "reason_for_visit": "Knee pain after running",
        });
        self.json("POST", "/".to_string(), patient, body).await
    }

    async fn free_slots(&self, user: &TestUser) -> Vec<String> {
        let (status, body) = self
            .get(format!("/doctors/{}/free-slots?date={}", self.doctor.uuid(), MONDAY), user)
            .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(body["slots"].clone()).unwrap()
    }
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .uri(format!("/doctors/{}/free-slots?date={}", app.doctor.uuid(), MONDAY))
        .body(Body::empty())
        .unwrap();

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_patient_books_and_slot_disappears() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("patient@example.com");

    assert_eq!(app.free_slots(&patient).await.len(), 6);

    let (status, body) = app.book(&patient, "10:00").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "scheduled");
    assert_eq!(body["time_slot"], "10:00");
    assert_eq!(body["allowed_transitions"], json!(["completed", "cancelled", "missed"]));

    assert_eq!(
        app.free_slots(&patient).await,
        vec!["09:00", "09:30", "10:30", "11:00", "11:30"]
    );
}

#[tokio::test]
async fn test_second_booking_for_slot_conflicts() {
    let app = TestApp::new().await;
    let first = TestUser::patient("first@example.com");
    let second = TestUser::patient("second@example.com");

    let (status, _) = app.book(&first, "09:00").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.book(&second, "09:00").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "unavailable");
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn test_slot_after_hours_is_bad_request() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("patient@example.com");

    let (status, body) = app.book(&patient, "14:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_patient_cannot_book_for_someone_else() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("patient@example.com");
    let other = TestUser::patient("other@example.com");

    let body = json!({
        "doctor_id": app.doctor.uuid(),
        "patient_id": other.uuid(),
        "date": MONDAY,
        "time_slot": "09:30",
        "reason_for_visit": "Knee pain after running",
    });
    let (status, _) = app.json("POST", "/".to_string(), &patient, body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_patient_is_not_found() {
    let app = TestApp::new().await;
    let admin = TestUser::admin("admin@example.com");

    let body = json!({
        "doctor_id": app.doctor.uuid(),
        "patient_id": Uuid::new_v4(),
        "date": MONDAY,
        "time_slot": "09:30",
        "reason_for_visit": "Knee pain after running",
    });
    let (status, body) = app.json("POST", "/".to_string(), &admin, body).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Patient not found");
}

#[tokio::test]
async fn test_cancel_then_complete_is_conflict() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("patient@example.com");

    let (_, booked) = app.book(&patient, "11:00").await;
    let id = booked["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .json("PATCH", format!("/{}/status", id), &patient, json!({ "status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["allowed_transitions"], json!([]));

    let (status, body) = app
        .json("PATCH", format!("/{}/status", id), &app.doctor, json!({ "status": "completed" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn test_patient_cannot_mark_missed() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("patient@example.com");

    let (_, booked) = app.book(&patient, "11:30").await;
    let id = booked["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .json("PATCH", format!("/{}/status", id), &patient, json!({ "status": "missed" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_status_is_rejected() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("patient@example.com");

    let (_, booked) = app.book(&patient, "09:00").await;
    let id = booked["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .json("PATCH", format!("/{}/status", id), &patient, json!({ "status": "rescheduled" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_malformed_input_is_bad_request() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("patient@example.com");

    let (status, body) = app.book(&patient, "25:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, body) = app.book(&patient, "9am").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let doctor_id = app.doctor.uuid();
    for uri in [
        format!("/doctors/{}/free-slots?date=not-a-date", doctor_id),
        format!("/doctors/{}/free-slots", doctor_id),
        "/doctors/not-a-uuid/free-slots?date=2026-03-02".to_string(),
        "/not-a-uuid".to_string(),
    ] {
        let (status, body) = app.get(uri.clone(), &patient).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["code"], "bad_request", "{}", uri);
        assert!(body["error"].is_string(), "{}", uri);
    }

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Authorization", format!("Bearer {}", app.token_for(&patient)))
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_appointment_visibility() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("patient@example.com");
    let stranger = TestUser::patient("stranger@example.com");

    let (_, booked) = app.book(&patient, "09:30").await;
    let uri = format!("/{}", booked["id"].as_str().unwrap());

    let (status, body) = app.get(uri.clone(), &patient).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason_for_visit"], "Knee pain after running");

    let (status, _) = app.get(uri.clone(), &app.doctor).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(uri, &stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get(format!("/{}", Uuid::new_v4()), &patient).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_schedule_is_staff_only_and_ordered() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("patient@example.com");

    app.book(&patient, "11:00").await;
    app.book(&patient, "09:00").await;

    let uri = format!("/doctors/{}/schedule?date={}", app.doctor.uuid(), MONDAY);

    let (status, _) = app.get(uri.clone(), &patient).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get(uri, &app.doctor).await;
    assert_eq!(status, StatusCode::OK);
    let slots: Vec<&str> = body["appointments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["time_slot"].as_str().unwrap())
        .collect();
    assert_eq!(slots, vec!["09:00", "11:00"]);
    assert_eq!(body["appointments"][0]["past_due"], false);
}
