use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medicare_adherence::{AdherenceSummary, CalendarDay, TodayStatus};

use crate::models::{Role, User};

// -- JWT Claims --

/// JWT claims shared across medicare-api (REST middleware) and
/// medicare-gateway (WebSocket authentication).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Session id; a revoked session invalidates the token.
    pub jti: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

// -- Patients --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddPatientRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

// -- Medications --

/// Create/update body. Fields arrive as raw form text and are validated
/// server-side with [`crate::validate::medication`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MedicationRequest {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub time_of_day: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkTakenRequest {
    #[serde(default)]
    pub image_url: Option<String>,
    /// The patient's calendar day. Must be within one day of the server's.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

// -- Photos --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoUploadResponse {
    pub file_name: String,
    pub url: String,
    pub size: u64,
    pub sha256: String,
}

// -- Dashboard --

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub medication_id: Uuid,
    pub name: String,
    pub last_taken: NaiveDate,
    pub has_photo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummaryResponse {
    pub patient_id: Uuid,
    pub reference_date: NaiveDate,
    pub summary: AdherenceSummary,
    pub today: TodayStatus,
    pub calendar: Vec<CalendarDay>,
    pub recent_activity: Vec<RecentActivity>,
}

// -- Reminders --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReminderRequest {
    #[serde(default)]
    pub message: Option<String>,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
