//! Screen-level state: which view is showing and what it displays.
//!
//! Front ends (the CLI, FFI hosts) drive a [`Portal`] with navigations and
//! form submissions and render whatever [`Screen`] results.

use tracing::debug;

use crate::api::Transport;
use crate::auth::{AuthContext, AuthResult};
use crate::directory::{DirectoryResult, PatientDirectory};
use crate::forms::{LoginForm, PatientForm, RegisterForm};
use crate::guard::{Navigation, Route};
use crate::models::{Patient, PatientRow, PatientSource, User};

/// What the current view displays.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    /// Session check still running
    Loading,
    Login {
        error: Option<String>,
    },
    Dashboard {
        user: Option<User>,
    },
    Patients {
        rows: Vec<PatientRow>,
        source: Option<PatientSource>,
        error: Option<String>,
    },
}

impl Screen {
    pub fn route(&self) -> Option<Route> {
        match self {
            Screen::Loading => None,
            Screen::Login { .. } => Some(Route::Login),
            Screen::Dashboard { .. } => Some(Route::Dashboard),
            Screen::Patients { .. } => Some(Route::Patients),
        }
    }
}

/// Auth context, patient directory and the current screen.
pub struct Portal<T> {
    auth: AuthContext<T>,
    directory: PatientDirectory,
    screen: Screen,
}

impl<T: Transport> Portal<T> {
    pub fn new(auth: AuthContext<T>) -> Self {
        Self {
            auth,
            directory: PatientDirectory::new(),
            screen: Screen::Loading,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn auth(&self) -> &AuthContext<T> {
        &self.auth
    }

    pub fn directory(&self) -> &PatientDirectory {
        &self.directory
    }

    /// Resolve the stored session, then show `route` (or where the guard
    /// sends us instead).
    pub fn start(&mut self, route: Route) -> &Screen {
        self.auth.restore();
        self.navigate(route)
    }

    pub fn navigate(&mut self, route: Route) -> &Screen {
        self.auth.check_expiry();
        if self.auth.take_redirect().is_some() {
            self.directory.clear();
        }

        match self.auth.guard(route) {
            Navigation::Pending => self.screen = Screen::Loading,
            Navigation::Render(target) | Navigation::Redirect(target) => {
                debug!(requested = route.path(), shown = target.path(), "navigate");
                self.render(target);
            }
        }
        &self.screen
    }

    /// Sign in; success lands on the dashboard, failure stays on login
    /// with the message shown.
    pub fn submit_login(&mut self, form: &LoginForm) -> AuthResult<()> {
        let result = self.auth.login(form);
        self.after_auth(result.map(|_| ()))
    }

    pub fn submit_register(&mut self, form: &RegisterForm) -> AuthResult<()> {
        let result = self.auth.register(form);
        self.after_auth(result.map(|_| ()))
    }

    pub fn logout(&mut self) -> AuthResult<()> {
        self.auth.logout()?;
        self.settle();
        Ok(())
    }

    /// Re-fetch the patient list and show it.
    pub fn refresh_patients(&mut self) -> &Screen {
        self.navigate(Route::Patients)
    }

    /// Fetch one record, for the detail view or edit modal.
    pub fn patient(&mut self, id: &str) -> DirectoryResult<Patient> {
        let result: DirectoryResult<Patient> = self.auth.get_patient(id).map_err(Into::into);
        self.settle();
        result
    }

    pub fn create_patient(&mut self, form: &PatientForm) -> DirectoryResult<Patient> {
        let result = self.directory.create(&mut self.auth, form);
        self.settle();
        result
    }

    pub fn update_patient(&mut self, id: &str, form: &PatientForm) -> DirectoryResult<Patient> {
        let result = self.directory.update(&mut self.auth, id, form);
        self.settle();
        result
    }

    pub fn delete_patient(&mut self, id: &str) -> DirectoryResult<()> {
        let result = self.directory.delete(&mut self.auth, id);
        self.settle();
        result
    }

    fn after_auth(&mut self, result: AuthResult<()>) -> AuthResult<()> {
        match &result {
            Ok(()) => {
                self.navigate(Route::Dashboard);
            }
            Err(_) => {
                self.screen = Screen::Login {
                    error: self.auth.last_error().map(str::to_string),
                };
            }
        }
        result
    }

    /// Follow a pending forced navigation, or redraw the patient table
    /// after a write.
    fn settle(&mut self) {
        if let Some(route) = self.auth.take_redirect() {
            self.directory.clear();
            self.render(route);
        } else if let Screen::Patients { .. } = self.screen {
            self.screen = self.patients_screen();
        }
    }

    fn render(&mut self, route: Route) {
        self.screen = match route {
            Route::Login => Screen::Login {
                error: self.auth.last_error().map(str::to_string),
            },
            Route::Dashboard => Screen::Dashboard {
                user: self.auth.user().cloned(),
            },
            Route::Patients => {
                if let Err(e) = self.directory.reload(&mut self.auth) {
                    if e.is_unauthorized() {
                        self.auth.take_redirect();
                        self.directory.clear();
                        self.render(Route::Login);
                        return;
                    }
                }
                self.patients_screen()
            }
        };
    }

    fn patients_screen(&self) -> Screen {
        Screen::Patients {
            rows: self.directory.rows(),
            source: self.directory.source(),
            error: self.directory.last_error().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::config::{ClientConfig, FallbackMode};
    use crate::session::SessionStore;
    use crate::stub::StubBackend;
    use std::sync::Arc;

    fn portal(stub: &Arc<StubBackend>) -> Portal<Arc<StubBackend>> {
        let config = ClientConfig::new("http://stub").with_fallback(FallbackMode::CannedPatients);
        Portal::new(AuthContext::new(
            ApiClient::new(config, Arc::clone(stub)),
            SessionStore::in_memory().unwrap(),
        ))
    }

    #[test]
    fn test_starts_on_login() {
        let stub = Arc::new(StubBackend::new());
        let mut app = portal(&stub);
        assert_eq!(app.screen(), &Screen::Loading);

        let screen = app.start(Route::Patients);
        assert_eq!(screen, &Screen::Login { error: None });
        assert_eq!(stub.requests_seen(), 0);
    }

    #[test]
    fn test_login_lands_on_dashboard() {
        let stub = Arc::new(StubBackend::new());
        let mut app = portal(&stub);
        app.start(Route::Login);

        app.submit_login(&LoginForm::new("admin@test.com", "admin123"))
            .unwrap();
        match app.screen() {
            Screen::Dashboard { user: Some(user) } => assert_eq!(user.email, "admin@test.com"),
            other => panic!("unexpected screen: {other:?}"),
        }

        // Already signed in: the login route bounces back
        assert_eq!(app.navigate(Route::Login).route(), Some(Route::Dashboard));
    }

    #[test]
    fn test_failed_login_shows_error() {
        let stub = Arc::new(StubBackend::new());
        let mut app = portal(&stub);
        app.start(Route::Login);

        assert!(app
            .submit_login(&LoginForm::new("admin@test.com", "not-it"))
            .is_err());
        assert_eq!(
            app.screen(),
            &Screen::Login {
                error: Some("Invalid email or password".into())
            }
        );
    }

    #[test]
    fn test_patients_screen_and_writes() {
        let stub = Arc::new(StubBackend::new().with_sample_patients());
        let mut app = portal(&stub);
        app.start(Route::Login);
        app.submit_login(&LoginForm::new("admin@test.com", "admin123"))
            .unwrap();

        let Screen::Patients { rows, source, .. } = app.navigate(Route::Patients).clone() else {
            panic!("expected patients screen");
        };
        assert_eq!(rows.len(), 3);
        assert_eq!(source, Some(PatientSource::Live));

        app.delete_patient(&rows[0].id).unwrap();
        let Screen::Patients { rows, .. } = app.screen() else {
            panic!("expected patients screen");
        };
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_revoked_token_returns_to_login() {
        let stub = Arc::new(StubBackend::new());
        let mut app = portal(&stub);
        app.start(Route::Login);
        app.submit_login(&LoginForm::new("admin@test.com", "admin123"))
            .unwrap();

        stub.revoke_tokens();
        let screen = app.navigate(Route::Patients);
        assert_eq!(screen.route(), Some(Route::Login));
        assert!(!app.auth().is_authenticated());
    }

    #[test]
    fn test_logout() {
        let stub = Arc::new(StubBackend::new());
        let mut app = portal(&stub);
        app.start(Route::Login);
        app.submit_login(&LoginForm::new("admin@test.com", "admin123"))
            .unwrap();

        app.logout().unwrap();
        assert_eq!(app.screen(), &Screen::Login { error: None });
        assert_eq!(app.navigate(Route::Dashboard).route(), Some(Route::Login));
    }
}
