use std::sync::RwLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use medicare_types::api::{
    AddPatientRequest, AuthResponse, ErrorBody, LoginRequest, MarkTakenRequest, MedicationRequest,
    PatientSummaryResponse, PhotoUploadResponse, ReminderRequest, SessionResponse, SignupRequest,
};
use medicare_types::models::{Medication, NotificationSettings, Reminder, User};

use crate::error::{ClientError, Result};

/// An image picked by the user, not yet uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub bytes: Vec<u8>,
    /// e.g. `image/jpeg`
    pub content_type: String,
}

/// Everything the client views need from the server.
#[async_trait]
pub trait CareBackend: Send + Sync {
    /// Bearer token sent with authenticated calls. Sign-in and sign-up set
    /// it; sign-out clears it.
    fn set_token(&self, token: Option<String>);

    async fn sign_up(&self, req: &SignupRequest) -> Result<AuthResponse>;
    async fn sign_in(&self, req: &LoginRequest) -> Result<AuthResponse>;
    async fn sign_out(&self) -> Result<()>;
    async fn current_session(&self) -> Result<SessionResponse>;

    async fn list_patients(&self) -> Result<Vec<User>>;
    async fn add_patient(&self, req: &AddPatientRequest) -> Result<User>;

    async fn list_medications(&self, patient_id: Uuid) -> Result<Vec<Medication>>;
    async fn create_medication(&self, patient_id: Uuid, req: &MedicationRequest) -> Result<Medication>;
    async fn update_medication(&self, medication_id: Uuid, req: &MedicationRequest) -> Result<Medication>;
    async fn delete_medication(&self, medication_id: Uuid) -> Result<()>;

    async fn upload_photo(&self, photo: &PhotoUpload) -> Result<PhotoUploadResponse>;
    /// `req.date` is the client's calendar day; the server uses its own when absent.
    async fn mark_taken(&self, medication_id: Uuid, req: &MarkTakenRequest) -> Result<Medication>;
    /// Every medication active on the given day; the server answers 404
    /// when there is none.
    async fn mark_all_taken(&self, patient_id: Uuid, req: &MarkTakenRequest) -> Result<Vec<Medication>>;

    async fn patient_summary(&self, patient_id: Uuid, date: Option<NaiveDate>) -> Result<PatientSummaryResponse>;

    async fn notification_settings(&self, patient_id: Uuid) -> Result<NotificationSettings>;
    async fn update_notification_settings(
        &self,
        patient_id: Uuid,
        settings: &NotificationSettings,
    ) -> Result<NotificationSettings>;
    async fn send_reminder(&self, patient_id: Uuid, message: Option<String>) -> Result<Reminder>;
}

/// reqwest-backed [`CareBackend`] talking to a MediCare server.
pub struct BackendClient {
    base_url: String,
    http: Client,
    token: RwLock<Option<String>>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http,
            token: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let rb = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.token() {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.request(Method::GET, path).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let resp = self.request(method, path).json(body).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<()> {
        let resp = self.request(method, path).send().await?;
        check(resp).await?;
        Ok(())
    }

    fn remember(&self, resp: &AuthResponse) {
        self.set_token(Some(resp.token.clone()));
    }
}

/// A 401 means the session is gone, except on login where it means bad
/// credentials. `path` may carry the base URL's prefix.
fn is_session_rejection(status: StatusCode, path: &str) -> bool {
    status == StatusCode::UNAUTHORIZED && !path.ends_with("/auth/login")
}

/// Map non-2xx responses onto [`ClientError`], keeping the server's message.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if is_session_rejection(status, resp.url().path()) {
        return Err(ClientError::Unauthorized);
    }

    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(e) => {
            warn!("Unreadable error body for HTTP {}: {}", status, e);
            status.canonical_reason().unwrap_or("Request failed").to_string()
        }
    };
    debug!("HTTP {}: {}", status, message);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl CareBackend for BackendClient {
    fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    async fn sign_up(&self, req: &SignupRequest) -> Result<AuthResponse> {
        let resp: AuthResponse = self.send_json(Method::POST, "/auth/signup", req).await?;
        self.remember(&resp);
        Ok(resp)
    }

    async fn sign_in(&self, req: &LoginRequest) -> Result<AuthResponse> {
        let resp: AuthResponse = self.send_json(Method::POST, "/auth/login", req).await?;
        self.remember(&resp);
        Ok(resp)
    }

    async fn sign_out(&self) -> Result<()> {
        let result = self.send_empty(Method::POST, "/auth/logout").await;
        self.set_token(None);
        match result {
            // Already gone server-side
            Err(ClientError::Unauthorized) => Ok(()),
            other => other,
        }
    }

    async fn current_session(&self) -> Result<SessionResponse> {
        if self.token().is_none() {
            return Err(ClientError::NotSignedIn);
        }
        self.get("/auth/session").await
    }

    async fn list_patients(&self) -> Result<Vec<User>> {
        self.get("/patients").await
    }

    async fn add_patient(&self, req: &AddPatientRequest) -> Result<User> {
        self.send_json(Method::POST, "/patients", req).await
    }

    async fn list_medications(&self, patient_id: Uuid) -> Result<Vec<Medication>> {
        self.get(&format!("/patients/{}/medications", patient_id)).await
    }

    async fn create_medication(&self, patient_id: Uuid, req: &MedicationRequest) -> Result<Medication> {
        self.send_json(Method::POST, &format!("/patients/{}/medications", patient_id), req)
            .await
    }

    async fn update_medication(&self, medication_id: Uuid, req: &MedicationRequest) -> Result<Medication> {
        self.send_json(Method::PUT, &format!("/medications/{}", medication_id), req)
            .await
    }

    async fn delete_medication(&self, medication_id: Uuid) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/medications/{}", medication_id))
            .await
    }

    async fn upload_photo(&self, photo: &PhotoUpload) -> Result<PhotoUploadResponse> {
        let resp = self
            .request(Method::POST, "/photos")
            .header(header::CONTENT_TYPE, &photo.content_type)
            .body(photo.bytes.clone())
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn mark_taken(&self, medication_id: Uuid, req: &MarkTakenRequest) -> Result<Medication> {
        self.send_json(Method::POST, &format!("/medications/{}/taken", medication_id), req)
            .await
    }

    async fn mark_all_taken(&self, patient_id: Uuid, req: &MarkTakenRequest) -> Result<Vec<Medication>> {
        self.send_json(Method::POST, &format!("/patients/{}/taken", patient_id), req)
            .await
    }

    async fn patient_summary(&self, patient_id: Uuid, date: Option<NaiveDate>) -> Result<PatientSummaryResponse> {
        let path = match date {
            Some(date) => format!("/patients/{}/summary?date={}", patient_id, date.format("%Y-%m-%d")),
            None => format!("/patients/{}/summary", patient_id),
        };
        self.get(&path).await
    }

    async fn notification_settings(&self, patient_id: Uuid) -> Result<NotificationSettings> {
        self.get(&format!("/patients/{}/notification-settings", patient_id))
            .await
    }

    async fn update_notification_settings(
        &self,
        patient_id: Uuid,
        settings: &NotificationSettings,
    ) -> Result<NotificationSettings> {
        self.send_json(
            Method::PUT,
            &format!("/patients/{}/notification-settings", patient_id),
            settings,
        )
        .await
    }

    async fn send_reminder(&self, patient_id: Uuid, message: Option<String>) -> Result<Reminder> {
        self.send_json(
            Method::POST,
            &format!("/patients/{}/reminders", patient_id),
            &ReminderRequest { message },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = BackendClient::new("http://localhost:3000/");
        assert_eq!(client.base_url(), "http://localhost:3000");
    }

    #[test]
    fn token_round_trips() {
        let client = BackendClient::new("http://localhost:3000");
        assert_eq!(client.token(), None);
        client.set_token(Some("abc".into()));
        assert_eq!(client.token().as_deref(), Some("abc"));
        client.set_token(None);
        assert_eq!(client.token(), None);
    }

    #[test]
    fn login_401_is_not_a_dead_session() {
        assert!(!is_session_rejection(StatusCode::UNAUTHORIZED, "/auth/login"));
        assert!(!is_session_rejection(StatusCode::UNAUTHORIZED, "/api/v1/auth/login"));
        assert!(is_session_rejection(StatusCode::UNAUTHORIZED, "/api/v1/patients"));
        assert!(!is_session_rejection(StatusCode::FORBIDDEN, "/api/v1/patients"));
    }
}
