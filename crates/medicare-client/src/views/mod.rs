//! View models for the two dashboards and the root router. They hold the
//! fetched medication list and re-derive every number from it after each
//! change, so there is nothing to keep in sync by hand.

pub mod caretaker;
pub mod patient;
pub mod root;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use medicare_adherence::{AdherenceConfig, AdherenceSummary, CalendarDay, TodayStatus};
use medicare_types::api::{PatientSummaryResponse, RecentActivity};
use medicare_types::dashboard::patient_summary;
use medicare_types::models::Medication;

use crate::backend::CareBackend;
use crate::error::Result;
use crate::invalidation::Invalidator;

/// Issued when a fetch starts; the result is applied only if no newer
/// fetch started in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    version: u64,
}

/// One patient's medications plus everything derived from them.
pub struct MedicationState {
    patient_id: Uuid,
    medications: Vec<Medication>,
    config: AdherenceConfig,
    today: NaiveDate,
    invalidator: Invalidator,
    generation: u64,
    fetched_version: Option<u64>,
    derived: PatientSummaryResponse,
}

impl MedicationState {
    pub fn new(patient_id: Uuid, invalidator: Invalidator, config: AdherenceConfig, today: NaiveDate) -> Self {
        Self {
            patient_id,
            medications: Vec::new(),
            config,
            today,
            invalidator,
            generation: 0,
            fetched_version: None,
            derived: patient_summary(patient_id, &[], today, &config),
        }
    }

    pub fn patient_id(&self) -> Uuid {
        self.patient_id
    }

    pub fn medications(&self) -> &[Medication] {
        &self.medications
    }

    pub fn medication(&self, id: Uuid) -> Option<&Medication> {
        self.medications.iter().find(|m| m.id == id)
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn config(&self) -> &AdherenceConfig {
        &self.config
    }

    /// Move the reference day, e.g. after midnight.
    pub fn set_today(&mut self, today: NaiveDate) {
        if self.today != today {
            self.today = today;
            self.recompute();
        }
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        FetchTicket {
            generation: self.generation,
            version: self.invalidator.version(self.patient_id),
        }
    }

    /// Apply a fetch result. Returns false, leaving state untouched, when a
    /// newer fetch has started since `ticket` was issued.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, medications: Vec<Medication>) -> bool {
        if ticket.generation != self.generation {
            debug!(
                "Dropping superseded fetch {} for patient {} (current {})",
                ticket.generation, self.patient_id, self.generation
            );
            return false;
        }
        self.fetched_version = Some(ticket.version);
        self.medications = medications;
        self.recompute();
        true
    }

    pub async fn refresh(&mut self, backend: &dyn CareBackend) -> Result<bool> {
        let ticket = self.begin_fetch();
        let medications = backend.list_medications(self.patient_id).await?;
        Ok(self.apply_fetch(ticket, medications))
    }

    /// True when the data changed since the last applied fetch.
    pub fn needs_refresh(&self) -> bool {
        self.fetched_version != Some(self.invalidator.version(self.patient_id))
    }

    /// Apply a change this client made and already sent to the server:
    /// bump the patient's version, but count the local copy as current.
    pub fn local_change<F>(&mut self, change: F)
    where
        F: FnOnce(&mut Vec<Medication>),
    {
        change(&mut self.medications);
        let version = self.invalidator.invalidate(self.patient_id);
        if self.fetched_version.is_some() {
            self.fetched_version = Some(version);
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        self.derived = patient_summary(self.patient_id, &self.medications, self.today, &self.config);
    }

    pub fn summary(&self) -> &AdherenceSummary {
        &self.derived.summary
    }

    pub fn calendar(&self) -> &[CalendarDay] {
        &self.derived.calendar
    }

    pub fn recent_activity(&self) -> &[RecentActivity] {
        &self.derived.recent_activity
    }

    pub fn today_status(&self) -> TodayStatus {
        self.derived.today
    }
}
