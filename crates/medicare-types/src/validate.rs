//! Input validation shared by the server handlers and the client forms, so
//! both sides reject the same input with the same message.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::api::{LoginRequest, MedicationRequest, SignupRequest};
use crate::models::NotificationSettings;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Email Required")]
    EmailRequired,
    #[error("Password Required")]
    PasswordRequired,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Password must be at least 6 characters long.")]
    WeakPassword,
    #[error("Username must be between 3 and 32 characters.")]
    InvalidUsername,
    #[error("Please fill in all medication fields.")]
    MissingMedicationFields,
    #[error("Dates must use the YYYY-MM-DD format.")]
    InvalidDate,
    #[error("Start date must not be after end date.")]
    DateRangeReversed,
    #[error("Times must use the HH:MM format.")]
    InvalidTime,
    #[error("Missed-dose grace period must be between 1 and 24 hours.")]
    InvalidGracePeriod,
}

/// A medication request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicationDraft {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub time_of_day: Option<String>,
}

/// `local@domain.tld` with no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn login(req: &LoginRequest) -> Result<(), ValidationError> {
    if req.email.trim().is_empty() {
        return Err(ValidationError::EmailRequired);
    }
    // Passwords are compared trimmed, so blank counts as missing.
    if req.password.trim().is_empty() {
        return Err(ValidationError::PasswordRequired);
    }
    Ok(())
}

pub fn signup(req: &SignupRequest) -> Result<(), ValidationError> {
    credentials(&req.email, &req.password, &req.username)
}

pub fn credentials(email: &str, password: &str, username: &str) -> Result<(), ValidationError> {
    if !is_valid_email(email.trim()) {
        return Err(ValidationError::InvalidEmail);
    }
    if password.trim().len() < MIN_PASSWORD_LEN {
        return Err(ValidationError::WeakPassword);
    }
    if !USERNAME_LEN.contains(&username.trim().chars().count()) {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(())
}

pub fn medication(req: &MedicationRequest) -> Result<MedicationDraft, ValidationError> {
    let required = [&req.name, &req.dosage, &req.frequency, &req.start_date, &req.end_date];
    if required.iter().any(|f| f.trim().is_empty()) {
        return Err(ValidationError::MissingMedicationFields);
    }

    let start_date = parse_date(&req.start_date)?;
    let end_date = parse_date(&req.end_date)?;
    if start_date > end_date {
        return Err(ValidationError::DateRangeReversed);
    }

    let time_of_day = match req.time_of_day.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(t) => {
            parse_time(t)?;
            Some(t.to_string())
        }
    };

    Ok(MedicationDraft {
        name: req.name.trim().to_string(),
        dosage: req.dosage.trim().to_string(),
        frequency: req.frequency.trim().to_string(),
        start_date,
        end_date,
        time_of_day,
    })
}

pub fn notification_settings(settings: &NotificationSettings) -> Result<(), ValidationError> {
    parse_time(&settings.reminder_time)?;
    if !(1..=24).contains(&settings.missed_alert_grace_hours) {
        return Err(ValidationError::InvalidGracePeriod);
    }
    if let Some(email) = settings.email.as_deref() {
        if !is_valid_email(email.trim()) {
            return Err(ValidationError::InvalidEmail);
        }
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate)
}

fn parse_time(s: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| ValidationError::InvalidTime)
}
