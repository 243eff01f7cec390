use chrono::NaiveDate;
use uuid::Uuid;

use medicare_adherence::{
    AdherenceConfig, DateWindow, DoseRecord, calendar, recent_activity, summarize, today_status,
};

use crate::api::{PatientSummaryResponse, RecentActivity};
use crate::models::Medication;

pub const RECENT_ACTIVITY_LIMIT: usize = 5;

/// Everything a dashboard shows for one patient, derived from the current
/// medication list. The server's summary endpoint and the client views both
/// call this, so they cannot disagree.
pub fn patient_summary(
    patient_id: Uuid,
    medications: &[Medication],
    reference: NaiveDate,
    config: &AdherenceConfig,
) -> PatientSummaryResponse {
    let records: Vec<DoseRecord> = medications.iter().map(Medication::dose_record).collect();
    let window = DateWindow::month_of(reference);

    let recent = recent_activity(
        medications,
        |m| m.dose_record().last_taken(config.out_of_window),
        RECENT_ACTIVITY_LIMIT,
    )
    .into_iter()
    .map(|(m, last_taken)| RecentActivity {
        medication_id: m.id,
        name: m.name.clone(),
        last_taken,
        has_photo: m.image_url.is_some(),
    })
    .collect();

    PatientSummaryResponse {
        patient_id,
        reference_date: reference,
        summary: summarize(&records, reference, window, config),
        today: today_status(&records, reference, config),
        calendar: calendar(&records, window, reference, config),
        recent_activity: recent,
    }
}
