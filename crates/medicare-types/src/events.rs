use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, role: Role },

    /// Something in a patient's data changed; subscribers should re-fetch.
    PatientDataChanged {
        patient_id: Uuid,
        reason: ChangeReason,
    },

    /// A caretaker nudged a patient
    Reminder {
        patient_id: Uuid,
        reminder_id: Uuid,
        message: String,
        sent_at: DateTime<Utc>,
    },
}

impl GatewayEvent {
    /// Returns the patient this event is scoped to. Events that return
    /// `None` are connection-local and never broadcast.
    pub fn patient_id(&self) -> Option<Uuid> {
        match self {
            Self::PatientDataChanged { patient_id, .. } => Some(*patient_id),
            Self::Reminder { patient_id, .. } => Some(*patient_id),
            Self::Ready { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeReason {
    MedicationCreated { medication_id: Uuid },
    MedicationUpdated { medication_id: Uuid },
    MedicationDeleted { medication_id: Uuid },
    DoseTaken { medication_ids: Vec<Uuid>, date: NaiveDate },
    SettingsUpdated,
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Receive invalidation events for these patients. Ids the caller may
    /// not see are dropped silently.
    Subscribe { patient_ids: Vec<Uuid> },
}
