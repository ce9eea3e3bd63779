//! Patient Portal Core Library
//!
//! Client core for a small patient-records web backend: durable session,
//! REST client, auth state machine and route guard, shared by the terminal
//! front end and native hosts over UniFFI.
//!
//! # Architecture
//!
//! ```text
//!   Screen (CLI / native host)
//!        │ navigate, submit forms
//!        ▼
//!   ┌─────────────────┐   guard(route, state)   ┌──────────────┐
//!   │     Portal      │ ──────────────────────► │ Route Guard  │
//!   └────────┬────────┘                         └──────────────┘
//!            │
//!   ┌────────▼────────┐        ┌──────────────────┐
//!   │   AuthContext   │ ─────► │  SessionStore    │──► SQLite session_state
//!   │ PatientDirectory│        └──────────────────┘
//!   └────────┬────────┘                 ▲ token, 401 clears
//!            │                          │
//!   ┌────────▼────────┐        ┌────────┴─────────┐
//!   │    ApiClient    │ ─────► │    Transport     │──► HTTP / StubBackend
//!   └─────────────────┘        └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite key/value store backing the session
//! - [`session`]: token/user persistence and token expiry checks
//! - [`api`]: REST client, transport seam and fallback records
//! - [`auth`]: auth state machine
//! - [`guard`]: route guard
//! - [`forms`]: client-side form rules
//! - [`directory`]: patient list state
//! - [`app`]: screen state driven by front ends
//! - [`stub`]: in-process backend for tests and demos

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod directory;
pub mod forms;
pub mod guard;
pub mod models;
pub mod session;
pub mod stub;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, HttpTransport, Transport};
pub use app::{Portal, Screen};
pub use auth::{AuthContext, AuthError, AuthState};
pub use config::{ClientConfig, FallbackMode};
pub use db::Database;
pub use directory::{DirectoryError, PatientDirectory};
pub use forms::{LoginForm, PatientForm, RegisterForm, ValidationErrors};
pub use guard::{Navigation, Route};
pub use models::{Patient, PatientInput, PatientRow, PatientSource, User};
pub use session::{Session, SessionStore};
pub use stub::StubBackend;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PortalError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ApiError> for PortalError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Transport(e) => PortalError::Network(e.to_string()),
            ApiError::Unauthorized { message } => PortalError::Unauthorized(message),
            ApiError::Session(e) => PortalError::Storage(e.to_string()),
            e => PortalError::Server(e.to_string()),
        }
    }
}

impl From<AuthError> for PortalError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(e) => PortalError::Validation(e.to_string()),
            AuthError::Api(e) => e.into(),
            AuthError::Session(e) => PortalError::Storage(e.to_string()),
        }
    }
}

impl From<DirectoryError> for PortalError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::Validation(e) => PortalError::Validation(e.to_string()),
            DirectoryError::Api(e) => e.into(),
        }
    }
}

impl From<session::SessionError> for PortalError {
    fn from(e: session::SessionError) -> Self {
        PortalError::Storage(e.to_string())
    }
}

impl From<api::TransportError> for PortalError {
    fn from(e: api::TransportError) -> Self {
        PortalError::Network(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PortalError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PortalError::Internal(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

type DynTransport = Box<dyn Transport + Send>;

fn portal_over(session: SessionStore, config: ClientConfig, transport: DynTransport) -> Arc<PatientPortal> {
    let auth = AuthContext::new(ApiClient::new(config, transport), session);
    Arc::new(PatientPortal {
        inner: Arc::new(Mutex::new(Portal::new(auth))),
    })
}

/// Open a portal talking HTTP to `base_url` (or the configured backend),
/// with the session kept in the database at `db_path`.
#[uniffi::export]
pub fn open_portal(
    db_path: String,
    base_url: Option<String>,
    offline_fallback: bool,
) -> Result<Arc<PatientPortal>, PortalError> {
    let mut config = match base_url {
        Some(url) => ClientConfig::new(url),
        None => ClientConfig::from_env(),
    };
    if offline_fallback {
        config = config.with_fallback(FallbackMode::CannedPatients);
    }

    let transport = HttpTransport::new(config.timeout)?;
    let session = SessionStore::open(&db_path)?;
    Ok(portal_over(session, config, Box::new(transport)))
}

/// Open a portal backed by the in-process stub and an in-memory session
/// (for demos and testing).
#[uniffi::export]
pub fn open_portal_with_stub() -> Result<Arc<PatientPortal>, PortalError> {
    let config = ClientConfig::new("http://stub").with_fallback(FallbackMode::CannedPatients);
    let session = SessionStore::in_memory()?;
    let stub = StubBackend::new().with_sample_patients();
    Ok(portal_over(session, config, Box::new(stub)))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe portal wrapper for FFI.
#[derive(uniffi::Object)]
pub struct PatientPortal {
    inner: Arc<Mutex<Portal<DynTransport>>>,
}

#[uniffi::export]
impl PatientPortal {
    // =========================================================================
    // Navigation
    // =========================================================================

    /// Resolve the stored session and show `path`.
    pub fn start(&self, path: String) -> Result<FfiScreen, PortalError> {
        let mut portal = self.inner.lock()?;
        Ok(portal.start(Route::from_path(&path)).clone().into())
    }

    /// Navigate to `path`, subject to the route guard.
    pub fn navigate(&self, path: String) -> Result<FfiScreen, PortalError> {
        let mut portal = self.inner.lock()?;
        Ok(portal.navigate(Route::from_path(&path)).clone().into())
    }

    /// The screen currently showing.
    pub fn current_screen(&self) -> Result<FfiScreen, PortalError> {
        let portal = self.inner.lock()?;
        Ok(portal.screen().clone().into())
    }

    // =========================================================================
    // Auth Operations
    // =========================================================================

    pub fn login(&self, email: String, password: String) -> Result<FfiScreen, PortalError> {
        let mut portal = self.inner.lock()?;
        portal.submit_login(&LoginForm::new(email, password))?;
        Ok(portal.screen().clone().into())
    }

    /// Create an account and sign in with it.
    pub fn register(
        &self,
        name: String,
        email: String,
        password: String,
        confirm_password: String,
    ) -> Result<FfiScreen, PortalError> {
        let mut portal = self.inner.lock()?;
        portal.submit_register(&RegisterForm {
            name,
            email,
            password,
            confirm_password,
        })?;
        Ok(portal.screen().clone().into())
    }

    pub fn logout(&self) -> Result<FfiScreen, PortalError> {
        let mut portal = self.inner.lock()?;
        portal.logout()?;
        Ok(portal.screen().clone().into())
    }

    pub fn is_authenticated(&self) -> Result<bool, PortalError> {
        let portal = self.inner.lock()?;
        Ok(portal.auth().is_authenticated())
    }

    pub fn current_user(&self) -> Result<Option<FfiUser>, PortalError> {
        let portal = self.inner.lock()?;
        Ok(portal.auth().user().cloned().map(Into::into))
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    pub fn get_patient(&self, id: String) -> Result<FfiPatient, PortalError> {
        let mut portal = self.inner.lock()?;
        Ok(portal.patient(&id)?.into())
    }

    pub fn create_patient(&self, form: FfiPatientForm) -> Result<FfiPatient, PortalError> {
        let form: PatientForm = form.into();
        let mut portal = self.inner.lock()?;
        Ok(portal.create_patient(&form)?.into())
    }

    pub fn update_patient(&self, id: String, form: FfiPatientForm) -> Result<FfiPatient, PortalError> {
        let form: PatientForm = form.into();
        let mut portal = self.inner.lock()?;
        Ok(portal.update_patient(&id, &form)?.into())
    }

    pub fn delete_patient(&self, id: String) -> Result<(), PortalError> {
        let mut portal = self.inner.lock()?;
        portal.delete_patient(&id)?;
        Ok(())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe user.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
}

impl From<User> for FfiUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            roles: user.roles,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    /// YYYY-MM-DD
    pub date_of_birth: Option<String>,
    pub address_street: Option<String>,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zip: Option<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            email: patient.email,
            phone_number: patient.phone_number,
            date_of_birth: patient
                .date_of_birth
                .map(|d| d.format("%Y-%m-%d").to_string()),
            address_street: patient.address_street,
            address_city: patient.address_city,
            address_state: patient.address_state,
            address_zip: patient.address_zip,
        }
    }
}

/// FFI-safe patient table row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientRow {
    pub id: String,
    pub name: String,
    pub age: Option<u32>,
    pub email: String,
}

impl From<PatientRow> for FfiPatientRow {
    fn from(row: PatientRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            age: row.age,
            email: row.email,
        }
    }
}

/// FFI-safe patient form; fields are raw text as typed.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: String,
    pub address_street: String,
    pub address_city: String,
    pub address_state: String,
    pub address_zip: String,
}

impl From<FfiPatientForm> for PatientForm {
    fn from(form: FfiPatientForm) -> Self {
        PatientForm {
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
            phone_number: form.phone_number,
            date_of_birth: form.date_of_birth,
            address_street: form.address_street,
            address_city: form.address_city,
            address_state: form.address_state,
            address_zip: form.address_zip,
        }
    }
}

/// FFI-safe screen.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiScreen {
    Loading,
    Login {
        error: Option<String>,
    },
    Dashboard {
        user: Option<FfiUser>,
    },
    Patients {
        rows: Vec<FfiPatientRow>,
        /// Rows are canned records, not live data
        fallback: bool,
        error: Option<String>,
    },
}

impl From<Screen> for FfiScreen {
    fn from(screen: Screen) -> Self {
        match screen {
            Screen::Loading => FfiScreen::Loading,
            Screen::Login { error } => FfiScreen::Login { error },
            Screen::Dashboard { user } => FfiScreen::Dashboard {
                user: user.map(Into::into),
            },
            Screen::Patients { rows, source, error } => FfiScreen::Patients {
                rows: rows.into_iter().map(Into::into).collect(),
                fallback: source == Some(PatientSource::Fallback),
                error,
            },
        }
    }
}
