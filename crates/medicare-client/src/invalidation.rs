use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use medicare_types::events::GatewayEvent;

/// Per-patient data versions. A mutation, local or pushed by the gateway,
/// bumps the patient's version; a view whose last fetch saw an older
/// version knows it is stale.
#[derive(Debug, Clone, Default)]
pub struct Invalidator {
    versions: Arc<Mutex<HashMap<Uuid, u64>>>,
}

impl Invalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self, patient_id: Uuid) -> u64 {
        let versions = self.versions.lock().unwrap_or_else(|e| e.into_inner());
        versions.get(&patient_id).copied().unwrap_or(0)
    }

    /// Mark everything known about `patient_id` stale. Returns the new version.
    pub fn invalidate(&self, patient_id: Uuid) -> u64 {
        let mut versions = self.versions.lock().unwrap_or_else(|e| e.into_inner());
        let version = versions.entry(patient_id).or_default();
        *version += 1;
        debug!("Patient {} data now at version {}", patient_id, version);
        *version
    }

    /// Feed a gateway event. Returns the patient whose data went stale.
    pub fn apply(&self, event: &GatewayEvent) -> Option<Uuid> {
        match event {
            GatewayEvent::PatientDataChanged { patient_id, .. } => {
                self.invalidate(*patient_id);
                Some(*patient_id)
            }
            GatewayEvent::Ready { .. } | GatewayEvent::Reminder { .. } => None,
        }
    }
}
