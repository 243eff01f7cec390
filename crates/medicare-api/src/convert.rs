//! Row → API model conversions. A row that fails to convert means the
//! database holds something the server never writes, so these surface as
//! internal errors.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use medicare_adherence::parse_day;
use medicare_db::models::{MedicationRow, NotificationSettingsRow, ReminderRow, UserRow};
use medicare_types::models::{Medication, NotificationSettings, Reminder, User};

pub fn user(row: UserRow) -> Result<User> {
    Ok(User {
        id: uuid(&row.id)?,
        email: row.email,
        username: row.username,
        role: row.role.parse().map_err(|e: String| anyhow!(e))?,
        caretaker_id: row.caretaker_id.as_deref().map(uuid).transpose()?,
        created_at: timestamp(&row.created_at),
    })
}

pub fn medication(row: MedicationRow) -> Result<Medication> {
    let taken_dates = row
        .taken_dates
        .iter()
        .filter_map(|d| {
            let day = parse_day(d);
            if day.is_none() {
                warn!("Skipping unparseable taken date '{}' on medication {}", d, row.id);
            }
            day
        })
        .collect();

    Ok(Medication {
        id: uuid(&row.id)?,
        patient_id: uuid(&row.patient_id)?,
        name: row.name,
        dosage: row.dosage,
        frequency: row.frequency,
        start_date: row.start_date.as_deref().and_then(parse_day),
        end_date: row.end_date.as_deref().and_then(parse_day),
        time_of_day: row.time_of_day,
        taken: row.taken,
        taken_dates,
        image_url: row.image_url,
        created_at: timestamp(&row.created_at),
    })
}

pub fn medications(rows: Vec<MedicationRow>) -> Result<Vec<Medication>> {
    rows.into_iter().map(medication).collect()
}

pub fn settings(row: NotificationSettingsRow) -> NotificationSettings {
    NotificationSettings {
        email_enabled: row.email_enabled,
        email: row.email,
        reminder_time: row.reminder_time,
        missed_alert_enabled: row.missed_alert_enabled,
        missed_alert_grace_hours: row.missed_alert_grace_hours.clamp(0, u8::MAX as i64) as u8,
        in_app_enabled: row.in_app_enabled,
    }
}

pub fn settings_row(patient_id: Uuid, settings: &NotificationSettings) -> NotificationSettingsRow {
    NotificationSettingsRow {
        patient_id: patient_id.to_string(),
        email_enabled: settings.email_enabled,
        email: settings.email.as_deref().map(str::trim).filter(|e| !e.is_empty()).map(String::from),
        reminder_time: settings.reminder_time.trim().to_string(),
        missed_alert_enabled: settings.missed_alert_enabled,
        missed_alert_grace_hours: settings.missed_alert_grace_hours as i64,
        in_app_enabled: settings.in_app_enabled,
    }
}

pub fn reminder(row: ReminderRow) -> Result<Reminder> {
    Ok(Reminder {
        id: uuid(&row.id)?,
        patient_id: uuid(&row.patient_id)?,
        caretaker_id: uuid(&row.caretaker_id)?,
        message: row.message,
        created_at: timestamp(&row.created_at),
    })
}

pub fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn uuid(s: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("corrupt id '{}' in database", s))
}

/// SQLite timestamps are written as RFC 3339, but rows imported by hand
/// often carry `datetime('now')` output instead.
fn timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|t| t.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' in database: {}", s, e);
            DateTime::<Utc>::UNIX_EPOCH
        })
}
