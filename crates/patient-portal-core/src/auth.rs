//! Auth context: the signed-in state shared by the guard and the screens.
//!
//! ```text
//!                 login/register
//!  Unauthenticated ─────────────► Authenticating
//!        ▲   ▲                      │        │
//!        │   └──────── failure ─────┘        │ success
//!        │                                   ▼
//!        └──── logout / 401 / expiry ── Authenticated
//! ```

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, ApiResult, Transport};
use crate::forms::{LoginForm, RegisterForm, ValidationErrors};
use crate::guard::{guard, Navigation, Route};
use crate::models::{Patient, PatientInput, PatientList, User};
use crate::session::{Session, SessionError, SessionStore};

/// Auth states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    /// A login or register call is in flight
    Authenticating,
    Authenticated,
}

/// Auth operation errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Owns the session store and API client for the lifetime of the app.
pub struct AuthContext<T> {
    client: ApiClient<T>,
    session: SessionStore,
    state: AuthState,
    resolved: bool,
    user: Option<User>,
    last_error: Option<String>,
    redirect: Option<Route>,
}

impl<T: Transport> AuthContext<T> {
    /// New context; call [`AuthContext::restore`] before guarding routes.
    pub fn new(client: ApiClient<T>, session: SessionStore) -> Self {
        Self {
            client,
            session,
            state: AuthState::Unauthenticated,
            resolved: false,
            user: None,
            last_error: None,
            redirect: None,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == AuthState::Authenticating
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    /// Whether the initial session check has run.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Message of the last failed login, register or forced logout.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Pending forced navigation, cleared on read.
    pub fn take_redirect(&mut self) -> Option<Route> {
        self.redirect.take()
    }

    /// Guard a navigation against the current state.
    pub fn guard(&self, route: Route) -> Navigation {
        guard(route, self.state, self.resolved)
    }

    /// Resolve the initial state from durable storage.
    pub fn restore(&mut self) -> AuthState {
        self.resolved = true;

        let stored = match self.session.session() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "could not read stored session");
                None
            }
        };

        let Some(stored) = stored else {
            self.set_signed_out();
            return self.state;
        };

        if !self.session.is_authenticated() {
            info!("stored token expired or unreadable, clearing session");
            self.clear_quietly();
            self.set_signed_out();
            return self.state;
        }

        self.state = AuthState::Authenticated;
        self.user = stored.user;

        if self.user.is_none() {
            match self.client.current_user(&self.session) {
                Ok(user) => {
                    if let Err(e) = self.session.set_auth_data(&stored.token, Some(&user)) {
                        warn!(error = %e, "could not cache user");
                    }
                    self.user = Some(user);
                }
                Err(e) if e.is_unauthorized() => self.force_logout(&e.to_string()),
                Err(e) => warn!(error = %e, "could not load user"),
            }
        }

        self.state
    }

    /// Validate and submit the login form.
    pub fn login(&mut self, form: &LoginForm) -> AuthResult<Session> {
        self.validated(form.validate())?;

        self.begin();
        let result = self
            .client
            .login(&self.session, form.email.trim(), &form.password);
        self.finish(result)
    }

    /// Validate and submit the register form, then sign in with the same
    /// credentials.
    pub fn register(&mut self, form: &RegisterForm) -> AuthResult<Session> {
        self.validated(form.validate())?;

        self.begin();
        let email = form.email.trim();
        let result = self
            .client
            .register(&self.session, email, &form.password, form.name.trim())
            .and_then(|_| self.client.login(&self.session, email, &form.password));
        self.finish(result)
    }

    /// Clear the session and send the user to the login route.
    pub fn logout(&mut self) -> AuthResult<()> {
        self.session.clear_auth_data()?;
        self.set_signed_out();
        self.last_error = None;
        self.redirect = Some(Route::Login);
        info!("logged out");
        Ok(())
    }

    /// Sign out if the stored token has expired since sign-in.
    ///
    /// Returns true when a forced logout happened.
    pub fn check_expiry(&mut self) -> bool {
        if self.state == AuthState::Authenticated && !self.session.is_authenticated() {
            self.clear_quietly();
            self.force_logout("Your session has expired. Please sign in again.");
            return true;
        }
        false
    }

    /// Pass an API result through, turning a 401 into a forced logout.
    pub fn observe<R>(&mut self, result: ApiResult<R>) -> ApiResult<R> {
        if let Err(e) = &result {
            if e.is_unauthorized() {
                self.force_logout(&e.to_string());
            }
        }
        result
    }

    pub fn fetch_patients(&mut self) -> ApiResult<PatientList> {
        let result = self.client.fetch_patients(&self.session);
        self.observe(result)
    }

    pub fn get_patient(&mut self, id: &str) -> ApiResult<Patient> {
        let result = self.client.get_patient(&self.session, id);
        self.observe(result)
    }

    pub fn create_patient(&mut self, data: &PatientInput) -> ApiResult<Patient> {
        let result = self.client.create_patient(&self.session, data);
        self.observe(result)
    }

    pub fn update_patient(&mut self, id: &str, data: &PatientInput) -> ApiResult<Patient> {
        let result = self.client.update_patient(&self.session, id, data);
        self.observe(result)
    }

    pub fn delete_patient(&mut self, id: &str) -> ApiResult<()> {
        let result = self.client.delete_patient(&self.session, id);
        self.observe(result)
    }

    fn validated(&mut self, result: Result<(), ValidationErrors>) -> AuthResult<()> {
        result.map_err(|errors| {
            self.last_error = Some(errors.to_string());
            AuthError::Validation(errors)
        })
    }

    fn begin(&mut self) {
        self.state = AuthState::Authenticating;
        self.last_error = None;
    }

    fn finish(&mut self, result: ApiResult<Session>) -> AuthResult<Session> {
        self.resolved = true;
        match result {
            Ok(session) => {
                self.state = AuthState::Authenticated;
                self.user = session.user.clone();
                Ok(session)
            }
            Err(e) => {
                // Nothing from a failed attempt may linger in storage
                self.clear_quietly();
                self.set_signed_out();
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    fn force_logout(&mut self, reason: &str) {
        warn!(reason, "forced logout");
        self.set_signed_out();
        self.last_error = Some(reason.to_string());
        self.redirect = Some(Route::Login);
    }

    fn set_signed_out(&mut self) {
        self.state = AuthState::Unauthenticated;
        self.user = None;
    }

    fn clear_quietly(&self) {
        if let Err(e) = self.session.clear_auth_data() {
            warn!(error = %e, "could not clear session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::token::tests::token_expiring;
    use crate::stub::StubBackend;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn context(stub: &Arc<StubBackend>) -> AuthContext<Arc<StubBackend>> {
        let client = ApiClient::new(ClientConfig::new("http://stub"), Arc::clone(stub));
        AuthContext::new(client, SessionStore::in_memory().unwrap())
    }

    fn admin_form() -> LoginForm {
        LoginForm::new("admin@test.com", "admin123")
    }

    #[test]
    fn test_starts_unresolved() {
        let stub = Arc::new(StubBackend::new());
        let ctx = context(&stub);
        assert!(!ctx.is_resolved());
        assert_eq!(ctx.guard(Route::Patients), Navigation::Pending);
    }

    #[test]
    fn test_login_success() {
        let stub = Arc::new(StubBackend::new());
        let mut ctx = context(&stub);
        ctx.restore();

        let session = ctx.login(&admin_form()).unwrap();
        assert_eq!(ctx.state(), AuthState::Authenticated);
        assert!(!ctx.is_loading());
        assert_eq!(ctx.user().unwrap().email, "admin@test.com");
        assert_eq!(ctx.session().get_token().unwrap(), Some(session.token));
        assert_eq!(ctx.guard(Route::Patients), Navigation::Render(Route::Patients));
    }

    #[test]
    fn test_login_bad_credentials() {
        let stub = Arc::new(StubBackend::new());
        let mut ctx = context(&stub);
        ctx.restore();

        let err = ctx
            .login(&LoginForm::new("admin@test.com", "wrong-password"))
            .unwrap_err();
        assert!(matches!(err, AuthError::Api(_)));
        assert_eq!(ctx.state(), AuthState::Unauthenticated);
        assert_eq!(ctx.last_error(), Some("Invalid email or password"));
        assert_eq!(ctx.session().get_token().unwrap(), None);
    }

    #[test]
    fn test_invalid_form_never_hits_network() {
        let stub = Arc::new(StubBackend::new());
        let mut ctx = context(&stub);
        ctx.restore();

        let err = ctx.login(&LoginForm::new("admin", "123")).unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(ctx.state(), AuthState::Unauthenticated);
        assert_eq!(stub.requests_seen(), 0);
    }

    #[test]
    fn test_register_signs_in() {
        let stub = Arc::new(StubBackend::new());
        let mut ctx = context(&stub);
        ctx.restore();

        let form = RegisterForm {
            name: "New Nurse".into(),
            email: "nurse@test.com".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
        };
        ctx.register(&form).unwrap();

        assert!(ctx.is_authenticated());
        assert_eq!(ctx.user().unwrap().name, "New Nurse");
    }

    #[test]
    fn test_register_duplicate_email() {
        let stub = Arc::new(StubBackend::new());
        let mut ctx = context(&stub);
        ctx.restore();

        let form = RegisterForm {
            name: "Admin Again".into(),
            email: "admin@test.com".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
        };
        assert!(ctx.register(&form).is_err());
        assert_eq!(ctx.state(), AuthState::Unauthenticated);
        assert_eq!(ctx.last_error(), Some("Email already registered"));
    }

    #[test]
    fn test_logout() {
        let stub = Arc::new(StubBackend::new());
        let mut ctx = context(&stub);
        ctx.restore();
        ctx.login(&admin_form()).unwrap();

        ctx.logout().unwrap();
        assert_eq!(ctx.state(), AuthState::Unauthenticated);
        assert!(ctx.user().is_none());
        assert!(!ctx.session().is_authenticated());
        assert_eq!(ctx.take_redirect(), Some(Route::Login));
        assert_eq!(ctx.take_redirect(), None);
    }

    #[test]
    fn test_restore_valid_session() {
        let stub = Arc::new(StubBackend::new());
        let mut first = context(&stub);
        first.restore();
        let session = first.login(&admin_form()).unwrap();

        // Same durable record, fresh context without a cached user
        let mut ctx = context(&stub);
        ctx.session().set_auth_data(&session.token, None).unwrap();

        assert_eq!(ctx.restore(), AuthState::Authenticated);
        assert_eq!(ctx.user().unwrap().email, "admin@test.com");
        assert!(ctx.session().get_user().unwrap().is_some());
    }

    #[test]
    fn test_restore_expired_session() {
        let stub = Arc::new(StubBackend::new());
        let mut ctx = context(&stub);
        ctx.session()
            .set_auth_data(&token_expiring(Utc::now() - Duration::minutes(1)), None)
            .unwrap();

        assert_eq!(ctx.restore(), AuthState::Unauthenticated);
        assert_eq!(ctx.session().get_token().unwrap(), None);
        assert_eq!(ctx.guard(Route::Dashboard), Navigation::Redirect(Route::Login));
    }

    #[test]
    fn test_unauthorized_forces_logout() {
        let stub = Arc::new(StubBackend::new());
        let mut ctx = context(&stub);
        ctx.restore();
        ctx.login(&admin_form()).unwrap();

        stub.revoke_tokens();

        let err = ctx.fetch_patients().unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(ctx.state(), AuthState::Unauthenticated);
        assert!(!ctx.session().is_authenticated());
        assert_eq!(ctx.take_redirect(), Some(Route::Login));
    }

    #[test]
    fn test_check_expiry() {
        let stub = Arc::new(StubBackend::new().with_token_ttl(Duration::seconds(-5)));
        let mut ctx = context(&stub);
        ctx.restore();

        // The stub hands out an already-expired token
        ctx.login(&admin_form()).unwrap_err();
        assert!(!ctx.check_expiry());

        let stub = Arc::new(StubBackend::new());
        let mut ctx = context(&stub);
        ctx.restore();
        ctx.login(&admin_form()).unwrap();
        assert!(!ctx.check_expiry());

        ctx.session()
            .set_auth_data(&token_expiring(Utc::now() - Duration::seconds(1)), None)
            .unwrap();
        assert!(ctx.check_expiry());
        assert_eq!(ctx.take_redirect(), Some(Route::Login));
    }
}
