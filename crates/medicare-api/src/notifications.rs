use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use medicare_types::api::{Claims, ReminderRequest};
use medicare_types::events::{ChangeReason, GatewayEvent};
use medicare_types::models::{NotificationSettings, Role};
use medicare_types::validate;

use crate::access::{self, require_role};
use crate::convert;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_REMINDER: &str = "Time to take your medication.";
const MAX_REMINDER_LEN: usize = 500;

/// Stored settings, or the defaults when the caretaker never saved any.
pub async fn get_settings(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    access::patient(&state, &claims, patient_id).await?;

    let pid = patient_id.to_string();
    let settings = state
        .with_db(move |db| db.get_notification_settings(&pid))
        .await?
        .map(convert::settings)
        .unwrap_or_default();

    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(settings): Json<NotificationSettings>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Caretaker)?;
    access::patient(&state, &claims, patient_id).await?;
    validate::notification_settings(&settings)?;

    let row = convert::settings_row(patient_id, &settings);
    let pid = patient_id.to_string();
    let saved = state
        .with_db(move |db| {
            db.upsert_notification_settings(&row)?;
            db.get_notification_settings(&pid)
        })
        .await?
        .map(convert::settings)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("settings vanished after upsert")))?;

    state
        .dispatcher
        .patient_data_changed(patient_id, ChangeReason::SettingsUpdated);

    Ok(Json(saved))
}

/// Caretaker nudges a patient. The reminder is stored and pushed to the
/// patient's open gateway connections.
pub async fn send_reminder(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReminderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Caretaker)?;
    access::patient(&state, &claims, patient_id).await?;

    let message = match req.message.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_REMINDER.to_string(),
        Some(m) if m.chars().count() > MAX_REMINDER_LEN => {
            return Err(ApiError::BadRequest(format!(
                "Reminder must be at most {} characters.",
                MAX_REMINDER_LEN
            )));
        }
        Some(m) => m.to_string(),
    };

    let id = Uuid::new_v4().to_string();
    let (pid, cid) = (patient_id.to_string(), claims.sub.to_string());
    let row = state
        .with_db(move |db| db.insert_reminder(&id, &pid, &cid, &message))
        .await?;
    let reminder = convert::reminder(row)?;

    info!("{} sent a reminder to patient {}", claims.email, patient_id);
    state.dispatcher.broadcast(GatewayEvent::Reminder {
        patient_id,
        reminder_id: reminder.id,
        message: reminder.message.clone(),
        sent_at: reminder.created_at,
    });

    Ok((StatusCode::CREATED, Json(reminder)))
}
