//! Form state behind the auth and medication screens. Validation goes
//! through `medicare_types::validate`, the same rules the server applies.

use medicare_types::api::{AddPatientRequest, LoginRequest, MedicationRequest, SignupRequest};
use medicare_types::models::{Medication, Role};
use medicare_types::validate::{self, MedicationDraft, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    pub username: String,
    pub role: Role,
    initial_role: Role,
}

impl AuthForm {
    pub fn new(role: Role) -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            username: String::new(),
            role,
            initial_role: role,
        }
    }

    /// Clear every field and go back to the role the form was opened with.
    pub fn reset(&mut self) {
        *self = Self::new(self.initial_role);
    }

    pub fn login_request(&self) -> Result<LoginRequest, ValidationError> {
        let req = LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        };
        validate::login(&req)?;
        Ok(req)
    }

    pub fn signup_request(&self) -> Result<SignupRequest, ValidationError> {
        let req = SignupRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            username: self.username.trim().to_string(),
            role: self.role,
        };
        validate::signup(&req)?;
        Ok(req)
    }
}

/// A caretaker creating an account for a new patient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientForm {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl PatientForm {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn request(&self) -> Result<AddPatientRequest, ValidationError> {
        let req = AddPatientRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            username: self.username.trim().to_string(),
        };
        validate::credentials(&req.email, &req.password, &req.username)?;
        Ok(req)
    }
}

/// Raw text of the medication create/edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedicationForm {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`
    pub end_date: String,
    /// `HH:MM`, optional
    pub time_of_day: String,
}

impl MedicationForm {
    /// Populate the form from an existing record for editing.
    pub fn from_medication(medication: &Medication) -> Self {
        let day = |d: Option<chrono::NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        Self {
            name: medication.name.clone(),
            dosage: medication.dosage.clone(),
            frequency: medication.frequency.clone(),
            start_date: day(medication.start_date),
            end_date: day(medication.end_date),
            time_of_day: medication.time_of_day.clone().unwrap_or_default(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn request(&self) -> MedicationRequest {
        MedicationRequest {
            name: self.name.clone(),
            dosage: self.dosage.clone(),
            frequency: self.frequency.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            time_of_day: Some(self.time_of_day.clone()).filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn validate(&self) -> Result<MedicationDraft, ValidationError> {
        validate::medication(&self.request())
    }
}
