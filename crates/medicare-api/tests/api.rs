use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Local};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use medicare_adherence::AdherenceConfig;
use medicare_api::storage::Storage;
use medicare_api::{AppStateInner, router};
use medicare_db::Database;
use medicare_gateway::dispatcher::Dispatcher;
use medicare_types::events::GatewayEvent;

struct TestApp {
    app: Router,
    dispatcher: Dispatcher,
    _photos: tempfile::TempDir,
}

async fn test_app() -> TestApp {
    let photos = tempfile::tempdir().unwrap();
    let dispatcher = Dispatcher::new();
    let state = Arc::new(AppStateInner {
        db: Arc::new(Database::open_in_memory().unwrap()),
        storage: Storage::new(photos.path().to_path_buf()).await.unwrap(),
        dispatcher: dispatcher.clone(),
        jwt_secret: "integration-test-secret".into(),
        public_url: "http://localhost:3000".into(),
        adherence: AdherenceConfig::default(),
    });
    TestApp {
        app: router(state),
        dispatcher,
        _photos: photos,
    }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn signup(&self, email: &str, role: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": email, "password": "secret123", "username": "tester", "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Caretaker creates a patient account and logs in as them.
    async fn add_patient(&self, caretaker: &str, email: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/patients",
                Some(caretaker),
                Some(json!({ "email": email, "password": "secret123", "username": "patient" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let patient_id = body["id"].as_str().unwrap().to_string();

        let (status, body) = self
            .call(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": email, "password": "secret123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (body["token"].as_str().unwrap().to_string(), patient_id)
    }

    async fn add_medication(&self, caretaker: &str, patient_id: &str, name: &str) -> String {
        let today = Local::now().date_naive();
        let (status, body) = self
            .call(
                Method::POST,
                &format!("/patients/{patient_id}/medications"),
                Some(caretaker),
                Some(json!({
                    "name": name,
                    "dosage": "1 tablet",
                    "frequency": "Daily",
                    "start_date": (today - Duration::days(5)).to_string(),
                    "end_date": (today + Duration::days(5)).to_string(),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app().await;
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn signup_validation_messages() {
    let app = test_app().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "not-an-email", "password": "secret123", "username": "abc", "role": "patient" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please enter a valid email address.");

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "a@b.co", "password": "123", "username": "abc", "role": "patient" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters long.");
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = test_app().await;
    app.signup("carol@example.com", "caretaker").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "Carol@Example.com", "password": "secret123", "username": "carol", "role": "patient" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_signups_with_one_email_yield_one_account() {
    let app = test_app().await;

    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..8 {
        let router = app.app.clone();
        tasks.spawn(async move {
            let body = json!({ "email": "race@example.com", "password": "secret123", "username": format!("racer{n}"), "role": "caretaker" });
            let req = Request::builder()
                .method(Method::POST)
                .uri("/auth/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            router.oneshot(req).await.unwrap().status()
        });
    }

    let mut statuses = Vec::new();
    while let Some(status) = tasks.join_next().await {
        statuses.push(status.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), 7);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = test_app().await;
    app.signup("carol@example.com", "caretaker").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "carol@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password.");
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = test_app().await;
    let (token, user_id) = app.signup("carol@example.com", "caretaker").await;

    let (status, body) = app.call(Method::GET, "/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id.as_str());
    assert_eq!(body["user"]["role"], "caretaker");

    let (status, _) = app.call(Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, "/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = test_app().await;
    let (status, _) = app.call(Method::GET, "/patients", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::GET, "/patients", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn caretaker_and_patient_flow() {
    let app = test_app().await;
    let (caretaker, _) = app.signup("carol@example.com", "caretaker").await;
    let (patient, patient_id) = app.add_patient(&caretaker, "pat@example.com").await;

    let (status, body) = app.call(Method::GET, "/patients", Some(&caretaker), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert!(body[0]["caretaker_id"].is_string());

    let mut events = app.dispatcher.subscribe();
    let med_id = app.add_medication(&caretaker, &patient_id, "Aspirin").await;
    let event = events.recv().await.unwrap();
    assert!(matches!(event, GatewayEvent::PatientDataChanged { .. }));

    // Patient sees the medication but cannot edit it.
    let (status, body) = app
        .call(Method::GET, &format!("/patients/{patient_id}/medications"), Some(&patient), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Aspirin");
    assert_eq!(body[0]["taken"], false);

    let (status, _) = app
        .call(Method::DELETE, &format!("/medications/{med_id}"), Some(&patient), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Mark taken twice: the date is recorded once.
    for _ in 0..2 {
        let (status, body) = app
            .call(
                Method::POST,
                &format!("/medications/{med_id}/taken"),
                Some(&patient),
                Some(json!({ "image_url": "http://localhost:3000/photos/1-abcd.jpg" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["taken"], true);
        assert_eq!(body["taken_dates"].as_array().unwrap().len(), 1);
    }

    let (status, body) = app
        .call(Method::GET, &format!("/patients/{patient_id}/summary"), Some(&caretaker), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["today"], "completed");
    assert_eq!(body["summary"]["current_streak"], 1);
    assert_eq!(body["recent_activity"][0]["has_photo"], true);
}

#[tokio::test]
async fn caretaker_edits_and_deletes_medication() {
    let app = test_app().await;
    let (caretaker, _) = app.signup("carol@example.com", "caretaker").await;
    let (_, patient_id) = app.add_patient(&caretaker, "pat@example.com").await;
    let med_id = app.add_medication(&caretaker, &patient_id, "Aspirin").await;

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/medications/{med_id}"),
            Some(&caretaker),
            Some(json!({
                "name": "Aspirin",
                "dosage": "2 tablets",
                "frequency": "Twice daily",
                "start_date": "2024-06-10",
                "end_date": "2024-06-01",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Start date must not be after end date.");

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/medications/{med_id}"),
            Some(&caretaker),
            Some(json!({
                "name": "Aspirin",
                "dosage": "2 tablets",
                "frequency": "Twice daily",
                "start_date": "2024-06-01",
                "end_date": "2024-06-30",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["dosage"], "2 tablets");

    let (status, _) = app
        .call(Method::DELETE, &format!("/medications/{med_id}"), Some(&caretaker), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(Method::DELETE, &format!("/medications/{med_id}"), Some(&caretaker), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mark_all_taken_needs_active_medication() {
    let app = test_app().await;
    let (caretaker, _) = app.signup("carol@example.com", "caretaker").await;
    let (patient, patient_id) = app.add_patient(&caretaker, "pat@example.com").await;

    let uri = format!("/patients/{patient_id}/taken");
    let (status, body) = app.call(Method::POST, &uri, Some(&patient), Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No medication found for this date.");

    app.add_medication(&caretaker, &patient_id, "Aspirin").await;
    app.add_medication(&caretaker, &patient_id, "Vitamin D").await;

    let (status, body) = app.call(Method::POST, &uri, Some(&patient), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let meds = body.as_array().unwrap();
    assert_eq!(meds.len(), 2);
    assert!(meds.iter().all(|m| m["taken"] == true));
}

#[tokio::test]
async fn mark_taken_records_the_patients_day() {
    let app = test_app().await;
    let (caretaker, _) = app.signup("carol@example.com", "caretaker").await;
    let (patient, patient_id) = app.add_patient(&caretaker, "pat@example.com").await;
    let med_id = app.add_medication(&caretaker, &patient_id, "Aspirin").await;

    // A patient behind the server's clock is still on yesterday.
    let yesterday = Local::now().date_naive() - Duration::days(1);
    let (status, body) = app
        .call(
            Method::POST,
            &format!("/patients/{patient_id}/taken"),
            Some(&patient),
            Some(json!({ "date": yesterday.to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body[0]["taken_dates"], json!([yesterday.to_string()]));

    let far = Local::now().date_naive() + Duration::days(3);
    let (status, body) = app
        .call(
            Method::POST,
            &format!("/medications/{med_id}/taken"),
            Some(&patient),
            Some(json!({ "date": far.to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Date must be within one day of today.");
}

#[tokio::test]
async fn other_caretakers_are_forbidden_and_unknown_patients_missing() {
    let app = test_app().await;
    let (caretaker, _) = app.signup("carol@example.com", "caretaker").await;
    let (stranger, _) = app.signup("dave@example.com", "caretaker").await;
    let (_, patient_id) = app.add_patient(&caretaker, "pat@example.com").await;

    let (status, _) = app
        .call(Method::GET, &format!("/patients/{patient_id}/medications"), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let unknown = uuid::Uuid::new_v4();
    let (status, _) = app
        .call(Method::GET, &format!("/patients/{unknown}/summary"), Some(&caretaker), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notification_settings_default_then_update() {
    let app = test_app().await;
    let (caretaker, _) = app.signup("carol@example.com", "caretaker").await;
    let (patient, patient_id) = app.add_patient(&caretaker, "pat@example.com").await;
    let uri = format!("/patients/{patient_id}/notification-settings");

    let (status, body) = app.call(Method::GET, &uri, Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reminder_time"], "08:00");
    assert_eq!(body["missed_alert_grace_hours"], 2);

    let mut settings = body.clone();
    settings["reminder_time"] = json!("25:99");
    let (status, _) = app.call(Method::PUT, &uri, Some(&caretaker), Some(settings.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    settings["reminder_time"] = json!("21:30");
    settings["email_enabled"] = json!(true);
    settings["email"] = json!("pat@example.com");
    let (status, body) = app.call(Method::PUT, &uri, Some(&caretaker), Some(settings.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["reminder_time"], "21:30");

    // Patients can read but not change their settings.
    let (status, _) = app.call(Method::PUT, &uri, Some(&patient), Some(settings)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reminders_are_pushed_to_the_gateway() {
    let app = test_app().await;
    let (caretaker, _) = app.signup("carol@example.com", "caretaker").await;
    let (_, patient_id) = app.add_patient(&caretaker, "pat@example.com").await;

    let mut events = app.dispatcher.subscribe();
    let (status, body) = app
        .call(
            Method::POST,
            &format!("/patients/{patient_id}/reminders"),
            Some(&caretaker),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Time to take your medication.");

    match events.recv().await.unwrap() {
        GatewayEvent::Reminder { patient_id: pid, .. } => assert_eq!(pid.to_string(), patient_id),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn photo_upload_and_download() {
    let app = test_app().await;
    let (token, _) = app.signup("pat@example.com", "patient").await;

    let upload = |content_type: &'static str| {
        Request::builder()
            .method(Method::POST)
            .uri("/photos")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(&b"\x89PNG fake"[..]))
            .unwrap()
    };

    let resp = app.app.clone().oneshot(upload("application/pdf")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let resp = app.app.clone().oneshot(upload("image/png")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let file_name = body["file_name"].as_str().unwrap();
    assert!(file_name.ends_with(".png"));
    assert_eq!(body["url"], format!("http://localhost:3000/photos/{file_name}"));

    let req = Request::builder()
        .uri(format!("/photos/{file_name}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"\x89PNG fake");

    let (status, _) = app.call(Method::GET, "/photos/missing.png", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
