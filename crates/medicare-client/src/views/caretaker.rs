use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use medicare_adherence::{AdherenceConfig, AdherenceSummary, CalendarDay, TodayStatus};
use medicare_types::api::{MedicationRequest, RecentActivity};
use medicare_types::models::{Medication, NotificationSettings, Reminder, Role, User};
use medicare_types::validate;

use crate::backend::CareBackend;
use crate::error::{ClientError, Result};
use crate::forms::{MedicationForm, PatientForm};
use crate::invalidation::Invalidator;
use crate::local_store::{CachedProfile, LocalStore, PROFILE_KEY};
use crate::views::MedicationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Overview,
    Activity,
    Calendar,
    Notifications,
    Medications,
}

/// At most one medication is being edited at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    Editing { id: Uuid, form: MedicationForm },
    /// The form is kept so a failed save can go back to editing.
    Submitting { id: Uuid, form: MedicationForm },
}

/// Handed out by [`CaretakerDashboard::begin_submit`]; pass it back with the
/// backend's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    pub id: Uuid,
    pub request: MedicationRequest,
}

pub struct CaretakerDashboard {
    backend: Arc<dyn CareBackend>,
    invalidator: Invalidator,
    config: AdherenceConfig,
    today: NaiveDate,
    profile: CachedProfile,
    patients: Vec<User>,
    state: Option<MedicationState>,
    tab: Tab,
    edit: EditState,
    /// The "add medication" form, usable while no edit is in progress.
    new_form: MedicationForm,
    patient_form: PatientForm,
    settings: Option<NotificationSettings>,
}

impl CaretakerDashboard {
    /// Read the cached profile, list assigned patients and load the first.
    pub async fn mount(
        backend: Arc<dyn CareBackend>,
        invalidator: Invalidator,
        store: &LocalStore,
        config: AdherenceConfig,
        today: NaiveDate,
    ) -> Result<Self> {
        let profile: CachedProfile = store.get(PROFILE_KEY)?.ok_or(ClientError::NotSignedIn)?;
        if profile.role != Role::Caretaker {
            return Err(ClientError::NotSignedIn);
        }

        let patients = backend.list_patients().await?;
        let mut view = Self {
            backend,
            invalidator,
            config,
            today,
            profile,
            patients,
            state: None,
            tab: Tab::default(),
            edit: EditState::Idle,
            new_form: MedicationForm::default(),
            patient_form: PatientForm::default(),
            settings: None,
        };

        if let Some(first) = view.patients.first().map(|p| p.id) {
            view.select_patient(first).await?;
        }
        Ok(view)
    }

    pub fn profile(&self) -> &CachedProfile {
        &self.profile
    }

    pub fn patients(&self) -> &[User] {
        &self.patients
    }

    pub fn patient_id(&self) -> Option<Uuid> {
        self.state.as_ref().map(MedicationState::patient_id)
    }

    fn state(&self) -> Result<&MedicationState> {
        self.state.as_ref().ok_or(ClientError::NoPatient)
    }

    fn state_mut(&mut self) -> Result<&mut MedicationState> {
        self.state.as_mut().ok_or(ClientError::NoPatient)
    }

    pub async fn select_patient(&mut self, patient_id: Uuid) -> Result<()> {
        if matches!(self.edit, EditState::Submitting { .. }) {
            return Err(ClientError::Busy);
        }
        if !self.patients.iter().any(|p| p.id == patient_id) {
            return Err(ClientError::NoPatient);
        }

        self.edit = EditState::Idle;
        self.settings = None;
        let mut state = MedicationState::new(patient_id, self.invalidator.clone(), self.config, self.today);
        state.refresh(self.backend.as_ref()).await?;
        self.state = Some(state);
        Ok(())
    }

    pub fn patient_form(&self) -> &PatientForm {
        &self.patient_form
    }

    pub fn patient_form_mut(&mut self) -> &mut PatientForm {
        &mut self.patient_form
    }

    /// Create an account for a new patient assigned to this caretaker, then
    /// re-list patients. The new patient is selected if none was.
    pub async fn add_patient(&mut self) -> Result<User> {
        let req = self.patient_form.request()?;
        let patient = self.backend.add_patient(&req).await?;
        info!("Added patient {} ({})", patient.username, patient.id);

        self.patient_form.clear();
        self.patients = self.backend.list_patients().await?;
        if self.state.is_none() {
            self.select_patient(patient.id).await?;
        }
        Ok(patient)
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    /// Switch tabs. The medications tab always re-fetches; notification
    /// settings load on first visit; the other tabs re-fetch only when the
    /// patient's data was invalidated.
    pub async fn set_tab(&mut self, tab: Tab) -> Result<()> {
        self.tab = tab;
        let backend = self.backend.clone();
        match tab {
            Tab::Medications => {
                self.state_mut()?.refresh(backend.as_ref()).await?;
            }
            Tab::Notifications => {
                if self.settings.is_none() {
                    self.load_settings().await?;
                }
            }
            Tab::Overview | Tab::Activity | Tab::Calendar => {
                let state = self.state_mut()?;
                if state.needs_refresh() {
                    state.refresh(backend.as_ref()).await?;
                }
            }
        }
        Ok(())
    }

    pub fn medications(&self) -> &[Medication] {
        self.state.as_ref().map(MedicationState::medications).unwrap_or_default()
    }

    pub fn needs_refresh(&self) -> bool {
        self.state.as_ref().is_some_and(MedicationState::needs_refresh)
    }

    // -- Edit state machine --

    pub fn edit_state(&self) -> &EditState {
        &self.edit
    }

    /// Open `id` for editing with its current values. Replaces any other
    /// edit in progress; rejected while a save is pending.
    pub fn begin_edit(&mut self, id: Uuid) -> Result<()> {
        if matches!(self.edit, EditState::Submitting { .. }) {
            return Err(ClientError::Busy);
        }
        let medication = self
            .state()?
            .medication(id)
            .ok_or(ClientError::Api {
                status: 404,
                message: "Medication not found.".into(),
            })?;
        self.edit = EditState::Editing {
            id,
            form: MedicationForm::from_medication(medication),
        };
        Ok(())
    }

    pub fn edit_form_mut(&mut self) -> Option<&mut MedicationForm> {
        match &mut self.edit {
            EditState::Editing { form, .. } => Some(form),
            _ => None,
        }
    }

    pub fn cancel_edit(&mut self) {
        if let EditState::Editing { .. } = self.edit {
            self.edit = EditState::Idle;
        }
    }

    /// Validate the edit form and move to `Submitting`. Invalid input keeps
    /// the form open.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket> {
        let EditState::Editing { id, form } = &self.edit else {
            return Err(match self.edit {
                EditState::Submitting { .. } => ClientError::Busy,
                _ => ClientError::NotEditing,
            });
        };
        form.validate()?;

        let ticket = SubmitTicket {
            id: *id,
            request: form.request(),
        };
        self.edit = EditState::Submitting {
            id: *id,
            form: form.clone(),
        };
        Ok(ticket)
    }

    /// Apply the backend's answer to a submit. Success replaces the record
    /// and returns to `Idle`; failure reopens the form.
    pub fn finish_submit(&mut self, ticket: SubmitTicket, result: Result<Medication>) -> Result<()> {
        let form = match std::mem::take(&mut self.edit) {
            EditState::Submitting { id, form } if id == ticket.id => form,
            other => {
                debug!("Ignoring stale submit result for {}", ticket.id);
                self.edit = other;
                return Ok(());
            }
        };

        match result {
            Ok(updated) => {
                info!("Saved medication {} ({})", updated.name, updated.id);
                self.state_mut()?.local_change(|meds| {
                    if let Some(slot) = meds.iter_mut().find(|m| m.id == updated.id) {
                        *slot = updated;
                    }
                });
                Ok(())
            }
            Err(e) => {
                self.edit = EditState::Editing { id: ticket.id, form };
                Err(e)
            }
        }
    }

    pub async fn submit_edit(&mut self) -> Result<()> {
        let ticket = self.begin_submit()?;
        let result = self.backend.update_medication(ticket.id, &ticket.request).await;
        self.finish_submit(ticket, result)
    }

    // -- Create / delete --

    pub fn new_form(&self) -> &MedicationForm {
        &self.new_form
    }

    pub fn new_form_mut(&mut self) -> &mut MedicationForm {
        &mut self.new_form
    }

    pub async fn create_medication(&mut self) -> Result<Medication> {
        if matches!(self.edit, EditState::Submitting { .. }) {
            return Err(ClientError::Busy);
        }
        self.new_form.validate()?;
        let patient_id = self.state()?.patient_id();

        let created = self
            .backend
            .create_medication(patient_id, &self.new_form.request())
            .await?;
        info!("Added medication {} ({})", created.name, created.id);

        self.new_form.clear();
        let inserted = created.clone();
        self.state_mut()?.local_change(|meds| meds.insert(0, inserted));
        Ok(created)
    }

    /// Delete on the server, then drop the record locally.
    pub async fn delete_medication(&mut self, id: Uuid) -> Result<()> {
        if matches!(self.edit, EditState::Submitting { .. }) {
            return Err(ClientError::Busy);
        }
        self.backend.delete_medication(id).await?;

        if matches!(&self.edit, EditState::Editing { id: editing, .. } if *editing == id) {
            self.edit = EditState::Idle;
        }
        self.state_mut()?.local_change(|meds| meds.retain(|m| m.id != id));
        Ok(())
    }

    // -- Notifications --

    pub fn settings(&self) -> Option<&NotificationSettings> {
        self.settings.as_ref()
    }

    pub async fn load_settings(&mut self) -> Result<&NotificationSettings> {
        let patient_id = self.state()?.patient_id();
        let settings = self.backend.notification_settings(patient_id).await?;
        Ok(self.settings.insert(settings))
    }

    pub async fn save_settings(&mut self, settings: NotificationSettings) -> Result<&NotificationSettings> {
        validate::notification_settings(&settings)?;
        let patient_id = self.state()?.patient_id();
        let saved = self
            .backend
            .update_notification_settings(patient_id, &settings)
            .await?;
        Ok(self.settings.insert(saved))
    }

    pub async fn send_reminder(&mut self, message: Option<String>) -> Result<Reminder> {
        let patient_id = self.state()?.patient_id();
        self.backend.send_reminder(patient_id, message).await
    }

    // -- Derived numbers --

    pub fn summary(&self) -> Option<&AdherenceSummary> {
        self.state.as_ref().map(MedicationState::summary)
    }

    pub fn calendar(&self) -> &[CalendarDay] {
        self.state.as_ref().map(MedicationState::calendar).unwrap_or_default()
    }

    pub fn recent_activity(&self) -> &[RecentActivity] {
        self.state
            .as_ref()
            .map(MedicationState::recent_activity)
            .unwrap_or_default()
    }

    pub fn today_status(&self) -> TodayStatus {
        self.state
            .as_ref()
            .map(MedicationState::today_status)
            .unwrap_or(TodayStatus::NoMedication)
    }
}
