//! Patient list state behind the patients table and its edit modal.

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, Transport};
use crate::auth::AuthContext;
use crate::forms::{PatientForm, ValidationErrors};
use crate::models::{Patient, PatientRow, PatientSource};

/// Directory operation errors.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl DirectoryError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DirectoryError::Api(e) if e.is_unauthorized())
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Cached patient list; every mutation is followed by a reload.
#[derive(Debug, Default)]
pub struct PatientDirectory {
    patients: Vec<Patient>,
    source: Option<PatientSource>,
    last_error: Option<String>,
}

impl PatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    /// Source of the cached list; `None` before the first successful load.
    pub fn source(&self) -> Option<PatientSource> {
        self.source
    }

    pub fn is_fallback(&self) -> bool {
        self.source == Some(PatientSource::Fallback)
    }

    /// Message of the last failed operation.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn find(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id == id)
    }

    /// Edit form seeded from a cached record.
    pub fn edit_form(&self, id: &str) -> Option<PatientForm> {
        self.find(id).map(PatientForm::from_patient)
    }

    /// Table rows as of today.
    pub fn rows(&self) -> Vec<PatientRow> {
        self.rows_on(Utc::now().date_naive())
    }

    pub fn rows_on(&self, today: NaiveDate) -> Vec<PatientRow> {
        self.patients.iter().map(|p| p.to_row(today)).collect()
    }

    /// Fetch the list and replace the cache.
    ///
    /// On failure the previous rows stay in place.
    pub fn reload<T: Transport>(&mut self, auth: &mut AuthContext<T>) -> DirectoryResult<()> {
        match auth.fetch_patients() {
            Ok(list) => {
                if list.is_fallback() {
                    warn!("showing fallback patients");
                }
                self.patients = list.patients;
                self.source = Some(list.source);
                self.last_error = None;
                Ok(())
            }
            Err(e) => Err(self.failed(e.into())),
        }
    }

    pub fn create<T: Transport>(
        &mut self,
        auth: &mut AuthContext<T>,
        form: &PatientForm,
    ) -> DirectoryResult<Patient> {
        let input = form.validate().map_err(|e| self.failed(e.into()))?;
        let created = auth
            .create_patient(&input)
            .map_err(|e| self.failed(e.into()))?;
        info!(id = %created.id, "patient created");

        self.reload_after_write(auth);
        Ok(created)
    }

    pub fn update<T: Transport>(
        &mut self,
        auth: &mut AuthContext<T>,
        id: &str,
        form: &PatientForm,
    ) -> DirectoryResult<Patient> {
        let input = form.validate().map_err(|e| self.failed(e.into()))?;
        let updated = auth
            .update_patient(id, &input)
            .map_err(|e| self.failed(e.into()))?;
        info!(id, "patient updated");

        self.reload_after_write(auth);
        Ok(updated)
    }

    pub fn delete<T: Transport>(&mut self, auth: &mut AuthContext<T>, id: &str) -> DirectoryResult<()> {
        auth.delete_patient(id).map_err(|e| self.failed(e.into()))?;
        info!(id, "patient deleted");

        self.reload_after_write(auth);
        Ok(())
    }

    /// Drop cached records, e.g. on logout.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn reload_after_write<T: Transport>(&mut self, auth: &mut AuthContext<T>) {
        // The write went through; a failed refresh only leaves stale rows
        if let Err(e) = self.reload(auth) {
            warn!(error = %e, "reload after write failed");
        }
    }

    fn failed(&mut self, error: DirectoryError) -> DirectoryError {
        self.last_error = Some(error.to_string());
        error
    }
}
