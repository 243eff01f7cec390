use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use medicare_types::api::{AddPatientRequest, Claims};
use medicare_types::models::{Role, User};
use medicare_types::validate;

use crate::access::require_role;
use crate::auth::create_account;
use crate::convert;
use crate::error::ApiError;
use crate::state::AppState;

/// Patients assigned to the calling caretaker.
pub async fn list_patients(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Caretaker)?;

    let cid = claims.sub.to_string();
    let rows = state
        .with_db(move |db| db.list_patients_for_caretaker(&cid))
        .await?;
    let patients = rows
        .into_iter()
        .map(convert::user)
        .collect::<anyhow::Result<Vec<User>>>()?;

    Ok(Json(patients))
}

/// Create a patient account assigned to the calling caretaker.
pub async fn add_patient(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddPatientRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Caretaker)?;
    validate::credentials(&req.email, &req.password, &req.username)?;

    let patient = create_account(
        &state,
        &req.email,
        &req.password,
        &req.username,
        Role::Patient,
        Some(claims.sub),
    )
    .await?;
    info!("{} added patient {} ({})", claims.email, patient.email, patient.id);

    Ok((StatusCode::CREATED, Json(patient)))
}
