use std::collections::HashMap;

use crate::Database;
use crate::models::{
    MedicationInput, MedicationRow, NotificationSettingsRow, PhotoRow, ReminderRow, SessionRow, UserRow,
};
use anyhow::Result;
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str = "id, email, username, password, role, caretaker_id, created_at";

const MEDICATION_COLUMNS: &str = "id, patient_id, name, dosage, frequency, start_date, end_date, \
                                  time_of_day, taken, image_url, created_at";

impl Database {
    // -- Users --

    /// Returns false, inserting nothing, when the email is already taken.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        username: &str,
        password_hash: &str,
        role: &str,
        caretaker_id: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, username, password, role, caretaker_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(email) DO NOTHING",
                rusqlite::params![id, email, username, password_hash, role, caretaker_id],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
            conn.query_row(&sql, [email], user_from_row).optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            conn.query_row(&sql, [id], user_from_row).optional()
        })
    }

    /// Patients assigned to a caretaker, by username.
    pub fn list_patients_for_caretaker(&self, caretaker_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE caretaker_id = ?1 AND role = 'patient'
                 ORDER BY username COLLATE NOCASE"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([caretaker_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// A patient sees their own data; a caretaker sees the patients assigned
    /// to them. Returns false for unknown ids and non-patient targets.
    pub fn can_access_patient(&self, user_id: &str, patient_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM users
                     WHERE id = ?2 AND role = 'patient' AND (id = ?1 OR caretaker_id = ?1)",
                    [user_id, patient_id],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Sessions --

    pub fn create_session(&self, id: &str, user_id: &str, expires_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)",
                (id, user_id, expires_at),
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, expires_at, revoked_at FROM sessions WHERE id = ?1",
                [id],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        expires_at: row.get(2)?,
                        revoked_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Returns false when the session was unknown or already revoked.
    pub fn revoke_session(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE sessions SET revoked_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND revoked_at IS NULL",
                [id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Medications --

    pub fn insert_medication(&self, id: &str, patient_id: &str, input: &MedicationInput) -> Result<MedicationRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO medications (id, patient_id, name, dosage, frequency, start_date, end_date, time_of_day)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id,
                    patient_id,
                    input.name,
                    input.dosage,
                    input.frequency,
                    input.start_date,
                    input.end_date,
                    input.time_of_day,
                ],
            )?;
            query_medication(conn, id)?.ok_or_else(|| anyhow::anyhow!("Medication {} vanished after insert", id))
        })
    }

    pub fn get_medication(&self, id: &str) -> Result<Option<MedicationRow>> {
        self.with_conn(|conn| query_medication(conn, id))
    }

    /// All medications of a patient, newest first.
    pub fn list_medications(&self, patient_id: &str) -> Result<Vec<MedicationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MEDICATION_COLUMNS} FROM medications
                 WHERE patient_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map([patient_id], medication_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            attach_taken_dates(conn, &mut rows)?;
            Ok(rows)
        })
    }

    /// Medications whose `[start_date, end_date]` contains `date`; a NULL
    /// bound is open-ended.
    pub fn active_medications_on(&self, patient_id: &str, date: &str) -> Result<Vec<MedicationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MEDICATION_COLUMNS} FROM medications
                 WHERE patient_id = ?1
                   AND (start_date IS NULL OR start_date <= ?2)
                   AND (end_date IS NULL OR end_date >= ?2)
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map([patient_id, date], medication_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            attach_taken_dates(conn, &mut rows)?;
            Ok(rows)
        })
    }

    /// Returns the updated row, or `None` if the medication does not exist.
    pub fn update_medication(&self, id: &str, input: &MedicationInput) -> Result<Option<MedicationRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE medications
                 SET name = ?2, dosage = ?3, frequency = ?4, start_date = ?5, end_date = ?6, time_of_day = ?7
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    input.name,
                    input.dosage,
                    input.frequency,
                    input.start_date,
                    input.end_date,
                    input.time_of_day,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_medication(conn, id)
        })
    }

    /// Taken dates go with the row (ON DELETE CASCADE); photos stay.
    pub fn delete_medication(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM medications WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Record `date` as taken for every medication in `medication_ids`, set
    /// the `taken` flag and, when given, the proof photo URL. Dates already
    /// recorded are left alone. Returns how many new dose rows were written.
    pub fn mark_taken(&self, medication_ids: &[String], date: &str, image_url: Option<&str>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            for id in medication_ids {
                inserted += tx.execute(
                    "INSERT OR IGNORE INTO medication_doses (medication_id, taken_date) VALUES (?1, ?2)",
                    (id, date),
                )?;
                tx.execute(
                    "UPDATE medications SET taken = 1, image_url = COALESCE(?2, image_url) WHERE id = ?1",
                    rusqlite::params![id, image_url],
                )?;
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    // -- Photos --

    pub fn insert_photo(&self, photo: &PhotoRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO photos (file_name, uploader_id, content_type, size, sha256) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    photo.file_name,
                    photo.uploader_id,
                    photo.content_type,
                    photo.size,
                    photo.sha256,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_photo(&self, file_name: &str) -> Result<Option<PhotoRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT file_name, uploader_id, content_type, size, sha256, created_at FROM photos WHERE file_name = ?1",
                [file_name],
                |row| {
                    Ok(PhotoRow {
                        file_name: row.get(0)?,
                        uploader_id: row.get(1)?,
                        content_type: row.get(2)?,
                        size: row.get(3)?,
                        sha256: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Notification settings --

    pub fn get_notification_settings(&self, patient_id: &str) -> Result<Option<NotificationSettingsRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT patient_id, email_enabled, email, reminder_time, missed_alert_enabled,
                        missed_alert_grace_hours, in_app_enabled
                 FROM notification_settings WHERE patient_id = ?1",
                [patient_id],
                |row| {
                    Ok(NotificationSettingsRow {
                        patient_id: row.get(0)?,
                        email_enabled: row.get(1)?,
                        email: row.get(2)?,
                        reminder_time: row.get(3)?,
                        missed_alert_enabled: row.get(4)?,
                        missed_alert_grace_hours: row.get(5)?,
                        in_app_enabled: row.get(6)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn upsert_notification_settings(&self, settings: &NotificationSettingsRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_settings
                    (patient_id, email_enabled, email, reminder_time, missed_alert_enabled,
                     missed_alert_grace_hours, in_app_enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(patient_id) DO UPDATE SET
                    email_enabled = excluded.email_enabled,
                    email = excluded.email,
                    reminder_time = excluded.reminder_time,
                    missed_alert_enabled = excluded.missed_alert_enabled,
                    missed_alert_grace_hours = excluded.missed_alert_grace_hours,
                    in_app_enabled = excluded.in_app_enabled,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                rusqlite::params![
                    settings.patient_id,
                    settings.email_enabled,
                    settings.email,
                    settings.reminder_time,
                    settings.missed_alert_enabled,
                    settings.missed_alert_grace_hours,
                    settings.in_app_enabled,
                ],
            )?;
            Ok(())
        })
    }

    // -- Reminders --

    pub fn insert_reminder(&self, id: &str, patient_id: &str, caretaker_id: &str, message: &str) -> Result<ReminderRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reminders (id, patient_id, caretaker_id, message) VALUES (?1, ?2, ?3, ?4)",
                (id, patient_id, caretaker_id, message),
            )?;
            let row = conn.query_row(
                "SELECT id, patient_id, caretaker_id, message, created_at FROM reminders WHERE id = ?1",
                [id],
                |row| {
                    Ok(ReminderRow {
                        id: row.get(0)?,
                        patient_id: row.get(1)?,
                        caretaker_id: row.get(2)?,
                        message: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )?;
            Ok(row)
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        caretaker_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn medication_from_row(row: &Row<'_>) -> rusqlite::Result<MedicationRow> {
    Ok(MedicationRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        name: row.get(2)?,
        dosage: row.get(3)?,
        frequency: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        time_of_day: row.get(7)?,
        taken: row.get(8)?,
        image_url: row.get(9)?,
        created_at: row.get(10)?,
        taken_dates: Vec::new(),
    })
}

fn query_medication(conn: &Connection, id: &str) -> Result<Option<MedicationRow>> {
    let sql = format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1");
    let Some(row) = conn.query_row(&sql, [id], medication_from_row).optional()? else {
        return Ok(None);
    };
    let mut rows = vec![row];
    attach_taken_dates(conn, &mut rows)?;
    Ok(rows.pop())
}

/// Batch-fetch taken dates for a set of medications (avoids N+1).
fn attach_taken_dates(conn: &Connection, rows: &mut [MedicationRow]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let placeholders: Vec<String> = (1..=rows.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT medication_id, taken_date FROM medication_doses
         WHERE medication_id IN ({})
         ORDER BY taken_date ASC",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> =
        rows.iter().map(|r| &r.id as &dyn rusqlite::types::ToSql).collect();

    let mut by_medication: HashMap<String, Vec<String>> = HashMap::new();
    let doses = stmt.query_map(params.as_slice(), |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for dose in doses {
        let (medication_id, taken_date) = dose?;
        by_medication.entry(medication_id).or_default().push(taken_date);
    }

    for row in rows.iter_mut() {
        row.taken_dates = by_medication.remove(&row.id).unwrap_or_default();
    }
    Ok(())
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
