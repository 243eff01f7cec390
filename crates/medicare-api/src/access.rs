use uuid::Uuid;

use medicare_types::api::Claims;
use medicare_types::models::{Medication, Role, User};

use crate::convert;
use crate::error::ApiError;
use crate::state::AppStateInner;

pub fn require_role(claims: &Claims, role: Role) -> Result<(), ApiError> {
    if claims.role == role {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// The patient record, provided the caller is that patient or their
/// caretaker. Unknown ids are 404 so they are distinguishable from 403.
pub async fn patient(state: &AppStateInner, claims: &Claims, patient_id: Uuid) -> Result<User, ApiError> {
    let uid = claims.sub.to_string();
    let pid = patient_id.to_string();
    let (row, allowed) = state
        .with_db(move |db| {
            let Some(row) = db.get_user_by_id(&pid)? else {
                return Ok((None, false));
            };
            let allowed = db.can_access_patient(&uid, &pid)?;
            Ok((Some(row), allowed))
        })
        .await?;

    let user = row.map(convert::user).transpose()?;
    match user {
        Some(user) if user.role == Role::Patient => {
            if allowed {
                Ok(user)
            } else {
                Err(ApiError::Forbidden)
            }
        }
        _ => Err(ApiError::NotFound("Patient not found.")),
    }
}

/// A medication the caller may see, by the same rule as [`patient`].
pub async fn medication(state: &AppStateInner, claims: &Claims, medication_id: Uuid) -> Result<Medication, ApiError> {
    let mid = medication_id.to_string();
    let row = state
        .with_db(move |db| db.get_medication(&mid))
        .await?
        .ok_or(ApiError::NotFound("Medication not found."))?;
    let medication = convert::medication(row)?;

    let uid = claims.sub.to_string();
    let pid = medication.patient_id.to_string();
    if !state.with_db(move |db| db.can_access_patient(&uid, &pid)).await? {
        return Err(ApiError::Forbidden);
    }
    Ok(medication)
}
