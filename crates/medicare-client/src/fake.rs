//! In-memory `CareBackend` for view and session tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use medicare_adherence::AdherenceConfig;
use medicare_types::api::{
    AddPatientRequest, AuthResponse, LoginRequest, MarkTakenRequest, MedicationRequest, PatientSummaryResponse,
    PhotoUploadResponse, SessionResponse, SignupRequest,
};
use medicare_types::dashboard::patient_summary;
use medicare_types::models::{Medication, NotificationSettings, Reminder, Role, User};
use medicare_types::validate;

use crate::backend::{CareBackend, PhotoUpload};
use crate::error::{ClientError, Result};
use crate::local_store::{CachedProfile, LocalStore, PROFILE_KEY};

pub fn medication(patient_id: Uuid, name: &str, start: NaiveDate, end: NaiveDate, taken: &[NaiveDate]) -> Medication {
    let mut taken_dates = taken.to_vec();
    taken_dates.sort();
    taken_dates.dedup();
    Medication {
        id: Uuid::new_v4(),
        patient_id,
        name: name.into(),
        dosage: "1 tablet".into(),
        frequency: "Daily".into(),
        start_date: Some(start),
        end_date: Some(end),
        time_of_day: None,
        taken: !taken_dates.is_empty(),
        taken_dates,
        image_url: None,
        created_at: Utc::now(),
    }
}

pub fn patient_user(caretaker_id: Uuid) -> User {
    User {
        id: Uuid::new_v4(),
        email: "pat@example.com".into(),
        username: "pat".into(),
        role: Role::Patient,
        caretaker_id: Some(caretaker_id),
        created_at: Utc::now(),
    }
}

/// Cache a profile the way a sign-in would.
pub fn sign_in_profile(store: &LocalStore, id: Uuid, role: Role) {
    let profile = CachedProfile {
        id,
        email: format!("{}@example.com", role),
        username: role.to_string(),
        role,
    };
    store.set(PROFILE_KEY, &profile).unwrap();
}

fn not_found(message: &str) -> ClientError {
    ClientError::Api {
        status: 404,
        message: message.into(),
    }
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    /// Newest first, like the server's listing.
    medications: Vec<Medication>,
    settings: HashMap<Uuid, NotificationSettings>,
    /// Issued token -> user id.
    tokens: HashMap<String, Uuid>,
    token: Option<String>,
}

pub struct FakeBackend {
    today: NaiveDate,
    inner: Mutex<Inner>,
    fail_uploads: AtomicBool,
    mark_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            inner: Mutex::new(Inner::default()),
            fail_uploads: AtomicBool::new(false),
            mark_calls: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, medication: Medication) {
        self.inner.lock().unwrap().medications.insert(0, medication);
    }

    pub fn add_user(&self, user: User) {
        self.inner.lock().unwrap().users.push(user);
    }

    pub fn medications_of(&self, patient_id: Uuid) -> Vec<Medication> {
        let inner = self.inner.lock().unwrap();
        inner
            .medications
            .iter()
            .filter(|m| m.patient_id == patient_id)
            .cloned()
            .collect()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Number of mark-taken requests received.
    pub fn mark_calls(&self) -> usize {
        self.mark_calls.load(Ordering::SeqCst)
    }

    fn auth(&self, user: User) -> AuthResponse {
        let token = Uuid::new_v4().to_string();
        let mut inner = self.inner.lock().unwrap();
        inner.tokens.insert(token.clone(), user.id);
        inner.token = Some(token.clone());
        AuthResponse {
            user,
            token,
            expires_at: Utc::now() + Duration::days(30),
        }
    }

    fn dose_day(&self, req: &MarkTakenRequest) -> NaiveDate {
        req.date.unwrap_or(self.today)
    }

    fn mark(medication: &mut Medication, day: NaiveDate, image_url: &Option<String>) {
        if !medication.taken_dates.contains(&day) {
            medication.taken_dates.push(day);
            medication.taken_dates.sort();
        }
        medication.taken = true;
        if image_url.is_some() {
            medication.image_url = image_url.clone();
        }
    }
}

#[async_trait]
impl CareBackend for FakeBackend {
    fn set_token(&self, token: Option<String>) {
        self.inner.lock().unwrap().token = token;
    }

    async fn sign_up(&self, req: &SignupRequest) -> Result<AuthResponse> {
        validate::signup(req)?;
        let user = User {
            id: Uuid::new_v4(),
            email: validate::normalize_email(&req.email),
            username: req.username.clone(),
            role: req.role,
            caretaker_id: None,
            created_at: Utc::now(),
        };
        self.add_user(user.clone());
        Ok(self.auth(user))
    }

    async fn sign_in(&self, req: &LoginRequest) -> Result<AuthResponse> {
        validate::login(req)?;
        let email = validate::normalize_email(&req.email);
        let user = {
            let inner = self.inner.lock().unwrap();
            inner.users.iter().find(|u| u.email == email).cloned()
        };
        match user {
            Some(user) => Ok(self.auth(user)),
            None => Err(ClientError::Api {
                status: 401,
                message: "Invalid email or password.".into(),
            }),
        }
    }

    async fn sign_out(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(token) = inner.token.take() {
            inner.tokens.remove(&token);
        }
        Ok(())
    }

    async fn current_session(&self) -> Result<SessionResponse> {
        let inner = self.inner.lock().unwrap();
        let token = inner.token.as_ref().ok_or(ClientError::NotSignedIn)?;
        let user_id = inner.tokens.get(token).ok_or(ClientError::Unauthorized)?;
        let user = inner
            .users
            .iter()
            .find(|u| u.id == *user_id)
            .cloned()
            .ok_or(ClientError::Unauthorized)?;
        Ok(SessionResponse {
            user,
            expires_at: Utc::now() + Duration::days(30),
        })
    }

    async fn list_patients(&self) -> Result<Vec<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().filter(|u| u.role == Role::Patient).cloned().collect())
    }

    async fn add_patient(&self, req: &AddPatientRequest) -> Result<User> {
        validate::credentials(&req.email, &req.password, &req.username)?;
        let email = validate::normalize_email(&req.email);
        if self.inner.lock().unwrap().users.iter().any(|u| u.email == email) {
            return Err(ClientError::Api {
                status: 409,
                message: "An account with this email already exists.".into(),
            });
        }
        let user = User {
            id: Uuid::new_v4(),
            email,
            username: req.username.clone(),
            role: Role::Patient,
            caretaker_id: None,
            created_at: Utc::now(),
        };
        self.add_user(user.clone());
        Ok(user)
    }

    async fn list_medications(&self, patient_id: Uuid) -> Result<Vec<Medication>> {
        Ok(self.medications_of(patient_id))
    }

    async fn create_medication(&self, patient_id: Uuid, req: &MedicationRequest) -> Result<Medication> {
        let draft = validate::medication(req)?;
        let created = Medication {
            id: Uuid::new_v4(),
            patient_id,
            name: draft.name,
            dosage: draft.dosage,
            frequency: draft.frequency,
            start_date: Some(draft.start_date),
            end_date: Some(draft.end_date),
            time_of_day: draft.time_of_day,
            taken: false,
            taken_dates: Vec::new(),
            image_url: None,
            created_at: Utc::now(),
        };
        self.insert(created.clone());
        Ok(created)
    }

    async fn update_medication(&self, medication_id: Uuid, req: &MedicationRequest) -> Result<Medication> {
        let draft = validate::medication(req)?;
        let mut inner = self.inner.lock().unwrap();
        let medication = inner
            .medications
            .iter_mut()
            .find(|m| m.id == medication_id)
            .ok_or_else(|| not_found("Medication not found."))?;
        medication.name = draft.name;
        medication.dosage = draft.dosage;
        medication.frequency = draft.frequency;
        medication.start_date = Some(draft.start_date);
        medication.end_date = Some(draft.end_date);
        medication.time_of_day = draft.time_of_day;
        Ok(medication.clone())
    }

    async fn delete_medication(&self, medication_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.medications.len();
        inner.medications.retain(|m| m.id != medication_id);
        if inner.medications.len() == before {
            return Err(not_found("Medication not found."));
        }
        Ok(())
    }

    async fn upload_photo(&self, photo: &PhotoUpload) -> Result<PhotoUploadResponse> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: 500,
                message: "Internal server error".into(),
            });
        }
        let file_name = format!("{}.jpg", Uuid::new_v4().simple());
        Ok(PhotoUploadResponse {
            url: format!("http://fake.test/photos/{}", file_name),
            file_name,
            size: photo.bytes.len() as u64,
            sha256: "0".repeat(64),
        })
    }

    async fn mark_taken(&self, medication_id: Uuid, req: &MarkTakenRequest) -> Result<Medication> {
        self.mark_calls.fetch_add(1, Ordering::SeqCst);
        let day = self.dose_day(req);
        let mut inner = self.inner.lock().unwrap();
        let medication = inner
            .medications
            .iter_mut()
            .find(|m| m.id == medication_id)
            .ok_or_else(|| not_found("Medication not found."))?;
        Self::mark(medication, day, &req.image_url);
        Ok(medication.clone())
    }

    async fn mark_all_taken(&self, patient_id: Uuid, req: &MarkTakenRequest) -> Result<Vec<Medication>> {
        self.mark_calls.fetch_add(1, Ordering::SeqCst);
        let day = self.dose_day(req);
        let mut inner = self.inner.lock().unwrap();
        let mut marked = Vec::new();
        for medication in inner
            .medications
            .iter_mut()
            .filter(|m| m.patient_id == patient_id && m.is_active_on(day))
        {
            Self::mark(medication, day, &req.image_url);
            marked.push(medication.clone());
        }
        if marked.is_empty() {
            return Err(not_found("No medication found for this date."));
        }
        Ok(marked)
    }

    async fn patient_summary(&self, patient_id: Uuid, date: Option<NaiveDate>) -> Result<PatientSummaryResponse> {
        let medications = self.medications_of(patient_id);
        Ok(patient_summary(
            patient_id,
            &medications,
            date.unwrap_or(self.today),
            &AdherenceConfig::default(),
        ))
    }

    async fn notification_settings(&self, patient_id: Uuid) -> Result<NotificationSettings> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.settings.get(&patient_id).cloned().unwrap_or_default())
    }

    async fn update_notification_settings(
        &self,
        patient_id: Uuid,
        settings: &NotificationSettings,
    ) -> Result<NotificationSettings> {
        validate::notification_settings(settings)?;
        self.inner.lock().unwrap().settings.insert(patient_id, settings.clone());
        Ok(settings.clone())
    }

    async fn send_reminder(&self, patient_id: Uuid, message: Option<String>) -> Result<Reminder> {
        Ok(Reminder {
            id: Uuid::new_v4(),
            patient_id,
            caretaker_id: Uuid::new_v4(),
            message: message.unwrap_or_else(|| "Time to take your medication.".into()),
            created_at: Utc::now(),
        })
    }
}
