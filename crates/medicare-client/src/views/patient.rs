use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use medicare_adherence::{
    AdherenceConfig, AdherenceSummary, CalendarDay, DateWindow, DayStatus, DoseRecord, TodayStatus, calendar,
};
use medicare_types::api::{MarkTakenRequest, RecentActivity};
use medicare_types::models::{Medication, Role};

use crate::backend::{CareBackend, PhotoUpload};
use crate::error::{ClientError, Result};
use crate::invalidation::Invalidator;
use crate::local_store::{CachedProfile, LocalStore, PROFILE_KEY};
use crate::views::MedicationState;

/// The patient's own dashboard: today's medications, the month calendar
/// and the mark-as-taken action.
pub struct PatientDashboard {
    backend: Arc<dyn CareBackend>,
    profile: CachedProfile,
    state: MedicationState,
    selected: NaiveDate,
}

impl PatientDashboard {
    /// Read the cached profile and fetch the patient's medications.
    pub async fn mount(
        backend: Arc<dyn CareBackend>,
        invalidator: Invalidator,
        store: &LocalStore,
        config: AdherenceConfig,
        today: NaiveDate,
    ) -> Result<Self> {
        let profile: CachedProfile = store.get(PROFILE_KEY)?.ok_or(ClientError::NotSignedIn)?;
        if profile.role != Role::Patient {
            return Err(ClientError::NotSignedIn);
        }

        let mut view = Self {
            state: MedicationState::new(profile.id, invalidator, config, today),
            backend,
            profile,
            selected: today,
        };
        view.refresh().await?;
        Ok(view)
    }

    pub fn profile(&self) -> &CachedProfile {
        &self.profile
    }

    pub fn patient_id(&self) -> Uuid {
        self.state.patient_id()
    }

    pub async fn refresh(&mut self) -> Result<bool> {
        self.state.refresh(self.backend.as_ref()).await
    }

    /// Re-fetch only if something invalidated this patient's data.
    pub async fn refresh_if_stale(&mut self) -> Result<bool> {
        if self.state.needs_refresh() {
            self.refresh().await
        } else {
            Ok(false)
        }
    }

    pub fn needs_refresh(&self) -> bool {
        self.state.needs_refresh()
    }

    pub fn set_today(&mut self, today: NaiveDate) {
        self.state.set_today(today);
    }

    pub fn medications(&self) -> &[Medication] {
        self.state.medications()
    }

    /// Medications scheduled for today, the list the mark-taken action covers.
    pub fn todays_medications(&self) -> Vec<&Medication> {
        let today = self.state.today();
        self.state
            .medications()
            .iter()
            .filter(|m| m.is_active_on(today))
            .collect()
    }

    pub fn select_date(&mut self, day: NaiveDate) {
        self.selected = day;
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected
    }

    /// Calendar mark for the selected day, which may lie outside the
    /// current month.
    pub fn selected_day(&self) -> CalendarDay {
        let records: Vec<DoseRecord> = self.state.medications().iter().map(Medication::dose_record).collect();
        let window = DateWindow::new(self.selected, self.selected);
        calendar(&records, window, self.state.today(), self.state.config())
            .into_iter()
            .next()
            .unwrap_or(CalendarDay {
                date: self.selected,
                status: DayStatus::NoMedication,
                taken_count: 0,
                active_count: 0,
            })
    }

    /// Medications recorded as taken on the selected day.
    pub fn taken_on_selected(&self) -> Vec<&Medication> {
        let policy = self.state.config().out_of_window;
        self.state
            .medications()
            .iter()
            .filter(|m| m.dose_record().was_taken_on(self.selected, policy))
            .collect()
    }

    /// Upload the optional proof photo, mark every medication active today
    /// as taken, then re-fetch. A failed upload aborts before any record
    /// changes.
    pub async fn mark_taken(&mut self, photo: Option<PhotoUpload>) -> Result<Vec<Medication>> {
        let req = self.mark_request(photo).await?;
        let marked = self.backend.mark_all_taken(self.patient_id(), &req).await?;
        info!("Marked {} medications taken", marked.len());

        self.finish_mutation().await?;
        Ok(marked)
    }

    /// Same flow as [`Self::mark_taken`] for a single medication.
    pub async fn mark_one_taken(&mut self, medication_id: Uuid, photo: Option<PhotoUpload>) -> Result<Medication> {
        let req = self.mark_request(photo).await?;
        let marked = self.backend.mark_taken(medication_id, &req).await?;
        info!("Marked {} taken", marked.name);

        self.finish_mutation().await?;
        Ok(marked)
    }

    /// Doses are recorded on this view's day, not the server's.
    async fn mark_request(&self, photo: Option<PhotoUpload>) -> Result<MarkTakenRequest> {
        let image_url = match photo {
            Some(photo) => match self.backend.upload_photo(&photo).await {
                Ok(uploaded) => Some(uploaded.url),
                Err(e) => {
                    warn!("Proof photo upload failed, nothing marked: {}", e);
                    return Err(e);
                }
            },
            None => None,
        };
        Ok(MarkTakenRequest {
            image_url,
            date: Some(self.state.today()),
        })
    }

    async fn finish_mutation(&mut self) -> Result<()> {
        self.state.local_change(|_| {});
        self.refresh().await?;
        Ok(())
    }

    pub fn summary(&self) -> &AdherenceSummary {
        self.state.summary()
    }

    pub fn calendar(&self) -> &[CalendarDay] {
        self.state.calendar()
    }

    pub fn recent_activity(&self) -> &[RecentActivity] {
        self.state.recent_activity()
    }

    pub fn today_status(&self) -> TodayStatus {
        self.state.today_status()
    }
}
