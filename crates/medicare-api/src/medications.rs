use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use medicare_db::models::MedicationInput;
use medicare_types::api::{Claims, MarkTakenRequest, MedicationRequest};
use medicare_types::events::ChangeReason;
use medicare_types::models::Role;
use medicare_types::validate::{self, MedicationDraft};

use crate::access::{self, require_role};
use crate::convert;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_medications(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    access::patient(&state, &claims, patient_id).await?;

    let pid = patient_id.to_string();
    let rows = state.with_db(move |db| db.list_medications(&pid)).await?;
    Ok(Json(convert::medications(rows)?))
}

pub async fn create_medication(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MedicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Caretaker)?;
    access::patient(&state, &claims, patient_id).await?;
    let input = input(validate::medication(&req)?);

    let id = Uuid::new_v4();
    let (mid, pid) = (id.to_string(), patient_id.to_string());
    let row = state
        .with_db(move |db| db.insert_medication(&mid, &pid, &input))
        .await?;
    let medication = convert::medication(row)?;

    info!("{} added medication {} for patient {}", claims.email, medication.name, patient_id);
    state
        .dispatcher
        .patient_data_changed(patient_id, ChangeReason::MedicationCreated { medication_id: id });

    Ok((StatusCode::CREATED, Json(medication)))
}

/// Replace the editable fields. Taken history is kept.
pub async fn update_medication(
    State(state): State<AppState>,
    Path(medication_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MedicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Caretaker)?;
    let existing = access::medication(&state, &claims, medication_id).await?;
    let input = input(validate::medication(&req)?);

    let mid = medication_id.to_string();
    let row = state
        .with_db(move |db| db.update_medication(&mid, &input))
        .await?
        .ok_or(ApiError::NotFound("Medication not found."))?;
    let medication = convert::medication(row)?;

    state
        .dispatcher
        .patient_data_changed(existing.patient_id, ChangeReason::MedicationUpdated { medication_id });

    Ok(Json(medication))
}

pub async fn delete_medication(
    State(state): State<AppState>,
    Path(medication_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Caretaker)?;
    let existing = access::medication(&state, &claims, medication_id).await?;

    let mid = medication_id.to_string();
    if !state.with_db(move |db| db.delete_medication(&mid)).await? {
        return Err(ApiError::NotFound("Medication not found."));
    }

    info!("{} deleted medication {} ({})", claims.email, existing.name, medication_id);
    state
        .dispatcher
        .patient_data_changed(existing.patient_id, ChangeReason::MedicationDeleted { medication_id });

    Ok(StatusCode::NO_CONTENT)
}

/// Patient marks one medication as taken on their current day.
pub async fn mark_taken(
    State(state): State<AppState>,
    Path(medication_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkTakenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Patient)?;
    let existing = access::medication(&state, &claims, medication_id).await?;
    let today = dose_day(state.today(), req.date)?;

    let ids = vec![medication_id.to_string()];
    let date = convert::day(today);
    let image_url = photo_url(&req)?;
    let mid = medication_id.to_string();
    let row = state
        .with_db(move |db| {
            db.mark_taken(&ids, &date, image_url.as_deref())?;
            db.get_medication(&mid)
        })
        .await?
        .ok_or(ApiError::NotFound("Medication not found."))?;

    state.dispatcher.patient_data_changed(
        existing.patient_id,
        ChangeReason::DoseTaken {
            medication_ids: vec![medication_id],
            date: today,
        },
    );

    Ok(Json(convert::medication(row)?))
}

/// Patient marks every medication active on their current day as taken.
/// Returns the updated medications.
pub async fn mark_all_taken(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkTakenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Patient)?;
    access::patient(&state, &claims, patient_id).await?;
    let today = dose_day(state.today(), req.date)?;

    let pid = patient_id.to_string();
    let date = convert::day(today);
    let image_url = photo_url(&req)?;
    let rows = state
        .with_db(move |db| {
            let active = db.active_medications_on(&pid, &date)?;
            if active.is_empty() {
                return Ok(None);
            }
            let ids: Vec<String> = active.into_iter().map(|m| m.id).collect();
            db.mark_taken(&ids, &date, image_url.as_deref())?;
            db.active_medications_on(&pid, &date).map(Some)
        })
        .await?
        .ok_or(ApiError::NotFound("No medication found for this date."))?;
    let medications = convert::medications(rows)?;

    info!("{} marked {} medications taken", claims.email, medications.len());
    state.dispatcher.patient_data_changed(
        patient_id,
        ChangeReason::DoseTaken {
            medication_ids: medications.iter().map(|m| m.id).collect(),
            date: today,
        },
    );

    Ok(Json(medications))
}

fn input(draft: MedicationDraft) -> MedicationInput {
    MedicationInput {
        name: draft.name,
        dosage: draft.dosage,
        frequency: draft.frequency,
        start_date: Some(convert::day(draft.start_date)),
        end_date: Some(convert::day(draft.end_date)),
        time_of_day: draft.time_of_day,
    }
}

/// The day a dose is recorded on: the patient's own calendar day, which may
/// differ from the server's by one across time zones.
fn dose_day(server_today: NaiveDate, requested: Option<NaiveDate>) -> Result<NaiveDate, ApiError> {
    let Some(day) = requested else {
        return Ok(server_today);
    };
    if (day - server_today).num_days().abs() > 1 {
        return Err(ApiError::BadRequest("Date must be within one day of today.".into()));
    }
    Ok(day)
}

/// Blank URLs count as "no photo".
fn photo_url(req: &MarkTakenRequest) -> Result<Option<String>, ApiError> {
    match req.image_url.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(Some(url.to_string())),
        Some(_) => Err(ApiError::BadRequest("Photo URL must be an http(s) link.".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn june(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn dose_day_allows_one_day_of_clock_skew() {
        assert_eq!(dose_day(june(10), None).unwrap(), june(10));
        assert_eq!(dose_day(june(10), Some(june(9))).unwrap(), june(9));
        assert_eq!(dose_day(june(10), Some(june(11))).unwrap(), june(11));
        assert!(matches!(dose_day(june(10), Some(june(12))), Err(ApiError::BadRequest(_))));
        assert!(matches!(dose_day(june(10), Some(june(8))), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn blank_photo_url_means_none() {
        let req = MarkTakenRequest {
            image_url: Some("  ".into()),
            date: None,
        };
        assert_eq!(photo_url(&req).unwrap(), None);

        let req = MarkTakenRequest {
            image_url: Some("ftp://x/y.jpg".into()),
            date: None,
        };
        assert!(photo_url(&req).is_err());
    }
}
