//! Raw SQLite rows. Ids and timestamps stay as stored text; the API layer
//! converts them into `medicare-types` models.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub caretaker_id: Option<String>,
    pub created_at: String,
}

pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub expires_at: String,
    pub revoked_at: Option<String>,
}

pub struct MedicationRow {
    pub id: String,
    pub patient_id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub time_of_day: Option<String>,
    pub taken: bool,
    pub image_url: Option<String>,
    pub created_at: String,
    /// Ascending ISO days, filled from `medication_doses`.
    pub taken_dates: Vec<String>,
}

/// Editable medication columns, shared by insert and update.
pub struct MedicationInput {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub time_of_day: Option<String>,
}

pub struct PhotoRow {
    pub file_name: String,
    pub uploader_id: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub created_at: String,
}

pub struct NotificationSettingsRow {
    pub patient_id: String,
    pub email_enabled: bool,
    pub email: Option<String>,
    pub reminder_time: String,
    pub missed_alert_enabled: bool,
    pub missed_alert_grace_hours: i64,
    pub in_app_enabled: bool,
}

pub struct ReminderRow {
    pub id: String,
    pub patient_id: String,
    pub caretaker_id: String,
    pub message: String,
    pub created_at: String,
}
