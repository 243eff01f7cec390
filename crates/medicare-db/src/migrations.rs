use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                username        TEXT NOT NULL,
                password        TEXT NOT NULL,
                role            TEXT NOT NULL CHECK (role IN ('patient', 'caretaker')),
                caretaker_id    TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_users_caretaker ON users(caretaker_id);

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at  TEXT NOT NULL,
                revoked_at  TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE medications (
                id              TEXT PRIMARY KEY,
                patient_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                dosage          TEXT NOT NULL,
                frequency       TEXT NOT NULL,
                start_date      TEXT,
                end_date        TEXT,
                time_of_day     TEXT,
                taken           INTEGER NOT NULL DEFAULT 0,
                image_url       TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_medications_patient
                ON medications(patient_id, created_at);

            -- One row per (medication, day): taken dates have set semantics.
            CREATE TABLE medication_doses (
                medication_id   TEXT NOT NULL REFERENCES medications(id) ON DELETE CASCADE,
                taken_date      TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (medication_id, taken_date)
            );

            -- Photos outlive the medications that reference them.
            CREATE TABLE photos (
                file_name       TEXT PRIMARY KEY,
                uploader_id     TEXT NOT NULL,
                content_type    TEXT NOT NULL,
                size            INTEGER NOT NULL,
                sha256          TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE notification_settings (
                patient_id                  TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                email_enabled               INTEGER NOT NULL,
                email                       TEXT,
                reminder_time               TEXT NOT NULL,
                missed_alert_enabled        INTEGER NOT NULL,
                missed_alert_grace_hours    INTEGER NOT NULL,
                in_app_enabled              INTEGER NOT NULL,
                updated_at                  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE reminders (
                id              TEXT PRIMARY KEY,
                patient_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                caretaker_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message         TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
