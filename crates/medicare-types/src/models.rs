use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medicare_adherence::DoseRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Caretaker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Caretaker => "caretaker",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::Patient => Self::Caretaker,
            Self::Caretaker => Self::Patient,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Self::Patient),
            "caretaker" => Ok(Self::Caretaker),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    /// The caretaker this patient is assigned to.
    pub caretaker_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub time_of_day: Option<String>,
    pub taken: bool,
    /// Sorted, no duplicates.
    pub taken_dates: Vec<NaiveDate>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Medication {
    pub fn dose_record(&self) -> DoseRecord {
        DoseRecord::new(self.start_date, self.end_date).with_taken(self.taken_dates.iter().copied())
    }

    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.dose_record().is_active_on(day)
    }
}

/// Caretaker-controlled notification preferences for one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub email_enabled: bool,
    pub email: Option<String>,
    /// `HH:MM`
    pub reminder_time: String,
    pub missed_alert_enabled: bool,
    pub missed_alert_grace_hours: u8,
    pub in_app_enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_enabled: false,
            email: None,
            reminder_time: "08:00".into(),
            missed_alert_enabled: true,
            missed_alert_grace_hours: 2,
            in_app_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub caretaker_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
