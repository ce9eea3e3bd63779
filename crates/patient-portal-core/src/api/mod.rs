//! REST client for the patient backend.
//!
//! Every call takes the [`SessionStore`] explicitly: the bearer token is read
//! from it, and a 401 from any endpoint clears it before the error is
//! returned.

mod fallback;
mod transport;

pub use fallback::*;
pub use transport::*;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ClientConfig, FallbackMode};
use crate::models::{
    AccessToken, Credentials, Patient, PatientInput, PatientList, Registration, User,
};
use crate::session::{Session, SessionError, SessionStore};

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const REGISTER_PATH: &str = "/api/v1/auth/register";
pub const CURRENT_USER_PATH: &str = "/api/v1/users/me";
pub const PATIENTS_PATH: &str = "/api/v1/patients";

/// API call errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(#[from] TransportError),

    #[error("{message}")]
    Status { status: u16, message: String },

    /// The backend rejected the credentials or token; the session is cleared.
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Unexpected response from server: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    /// The backend could not answer: transport failure or a 5xx.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Payloads may arrive wrapped as `{"data": ...}` or bare.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(data) => data,
        }
    }
}

fn unwrap_data<T: DeserializeOwned>(response: &HttpResponse) -> ApiResult<T> {
    Ok(response.parse::<Envelope<T>>()?.into_inner())
}

/// Whether a request carries the stored bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Anonymous,
    Bearer,
}

/// Client for the auth and patient endpoints.
pub struct ApiClient<T> {
    config: ClientConfig,
    transport: T,
}

impl ApiClient<HttpTransport> {
    /// Client over real HTTP with the configured timeout.
    pub fn http(config: ClientConfig) -> ApiResult<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::new(config, transport))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issue one request and map non-success statuses to errors.
    fn request(
        &self,
        session: &SessionStore,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        auth: Auth,
        failure: &str,
    ) -> ApiResult<HttpResponse> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if auth == Auth::Bearer {
            if let Some(bearer) = session.bearer_header()? {
                headers.push(("Authorization".to_string(), bearer));
            }
        }

        let url = self.config.url(path);
        debug!(method = method.as_str(), %url, "sending request");

        let response = self.transport.send(HttpRequest {
            method,
            url,
            headers,
            body,
        })?;

        if response.status == 401 {
            warn!(path, "authentication rejected, clearing session");
            session.clear_auth_data()?;
            return Err(ApiError::Unauthorized {
                message: response
                    .error_message()
                    .unwrap_or_else(|| "Authentication required".to_string()),
            });
        }

        if !response.is_success() {
            let message = response
                .error_message()
                .unwrap_or_else(|| format!("{failure}: {}", response.status));
            return Err(ApiError::Status {
                status: response.status,
                message,
            });
        }

        Ok(response)
    }

    /// Exchange credentials for a token and store the new session.
    ///
    /// The user record is fetched afterwards; if that fails for any reason
    /// other than a 401 the session keeps the token alone.
    pub fn login(&self, session: &SessionStore, email: &str, password: &str) -> ApiResult<Session> {
        let response = self.request(
            session,
            Method::Post,
            LOGIN_PATH,
            Some(serde_json::to_value(Credentials {
                email: email.to_string(),
                password: password.to_string(),
            })?),
            Auth::Anonymous,
            "Login failed",
        )?;
        let token: AccessToken = response.parse()?;

        // Drop any previous user before the new token goes in
        session.clear_auth_data()?;
        session.set_auth_data(&token.access_token, None)?;

        let user = match self.current_user(session) {
            Ok(user) => {
                session.set_auth_data(&token.access_token, Some(&user))?;
                Some(user)
            }
            Err(e) if e.is_unauthorized() => return Err(e),
            Err(e) => {
                warn!(error = %e, "logged in but could not load user");
                None
            }
        };

        debug!(user_id = ?user.as_ref().map(|u| &u.id), "logged in");
        Ok(Session {
            token: token.access_token,
            user,
        })
    }

    /// Create an account. Does not sign in.
    pub fn register(
        &self,
        session: &SessionStore,
        email: &str,
        password: &str,
        name: &str,
    ) -> ApiResult<User> {
        let response = self.request(
            session,
            Method::Post,
            REGISTER_PATH,
            Some(serde_json::to_value(Registration {
                email: email.to_string(),
                password: password.to_string(),
                name: name.to_string(),
            })?),
            Auth::Anonymous,
            "Registration failed",
        )?;
        let user: User = unwrap_data(&response)?;
        debug!(user_id = %user.id, "registered");
        Ok(user)
    }

    /// The user the stored token belongs to.
    pub fn current_user(&self, session: &SessionStore) -> ApiResult<User> {
        let response = self.request(
            session,
            Method::Get,
            CURRENT_USER_PATH,
            None,
            Auth::Bearer,
            "Failed to load user",
        )?;
        unwrap_data(&response)
    }

    /// List patients, substituting canned records when the backend is
    /// unavailable and the fallback is enabled.
    pub fn fetch_patients(&self, session: &SessionStore) -> ApiResult<PatientList> {
        let result = self
            .request(
                session,
                Method::Get,
                PATIENTS_PATH,
                None,
                Auth::Bearer,
                "Failed to fetch patients",
            )
            .and_then(|response| unwrap_data::<Vec<Patient>>(&response));

        match result {
            Ok(patients) => {
                debug!(count = patients.len(), "fetched patients");
                Ok(PatientList::live(patients))
            }
            Err(e) if e.is_unavailable() && self.config.fallback == FallbackMode::CannedPatients => {
                warn!(error = %e, "backend unavailable, using fallback patients");
                Ok(fallback_list())
            }
            Err(e) => Err(e),
        }
    }

    pub fn get_patient(&self, session: &SessionStore, id: &str) -> ApiResult<Patient> {
        let response = self.request(
            session,
            Method::Get,
            &patient_path(id),
            None,
            Auth::Bearer,
            "Failed to fetch patient",
        )?;
        unwrap_data(&response)
    }

    pub fn create_patient(&self, session: &SessionStore, data: &PatientInput) -> ApiResult<Patient> {
        let response = self.request(
            session,
            Method::Post,
            PATIENTS_PATH,
            Some(serde_json::to_value(data)?),
            Auth::Bearer,
            "Failed to create patient",
        )?;
        unwrap_data(&response)
    }

    pub fn update_patient(
        &self,
        session: &SessionStore,
        id: &str,
        data: &PatientInput,
    ) -> ApiResult<Patient> {
        let response = self.request(
            session,
            Method::Put,
            &patient_path(id),
            Some(data.to_update_body()?),
            Auth::Bearer,
            "Failed to update patient",
        )?;
        unwrap_data(&response)
    }

    pub fn delete_patient(&self, session: &SessionStore, id: &str) -> ApiResult<()> {
        self.request(
            session,
            Method::Delete,
            &patient_path(id),
            None,
            Auth::Bearer,
            "Failed to delete patient",
        )?;
        Ok(())
    }
}

fn patient_path(id: &str) -> String {
    format!("{PATIENTS_PATH}/{id}")
}
