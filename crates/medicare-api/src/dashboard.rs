use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

use medicare_types::api::{Claims, SummaryQuery};
use medicare_types::dashboard::patient_summary;

use crate::access;
use crate::convert;
use crate::error::ApiError;
use crate::state::AppState;

/// Adherence numbers, calendar marks and recent activity for one patient,
/// as of `?date=` or today.
pub async fn summary(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<SummaryQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    access::patient(&state, &claims, patient_id).await?;

    let pid = patient_id.to_string();
    let rows = state.with_db(move |db| db.list_medications(&pid)).await?;
    let medications = convert::medications(rows)?;

    let reference = query.date.unwrap_or_else(|| state.today());
    Ok(Json(patient_summary(patient_id, &medications, reference, &state.adherence)))
}
