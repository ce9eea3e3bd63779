//! In-process stub backend.
//!
//! Implements [`Transport`] by answering requests the way the patient REST
//! API does, so the client can be exercised end to end without a server.
//! It is a test double; nothing here is meant to guard real data.

pub mod tokens;

use std::sync::Mutex;

use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::api::{HttpRequest, HttpResponse, Method, Transport, TransportError, TransportResult};
use crate::forms::is_valid_email;
use crate::models::{Patient, PatientInput};

use tokens::TokenRejection;

pub const ADMIN_EMAIL: &str = "admin@test.com";
pub const ADMIN_PASSWORD: &str = "admin123";

const PATIENT_ROLES: [&str; 2] = ["ADMIN", "STAFF"];
const PATIENT_FIELDS: [&str; 9] = [
    "first_name",
    "last_name",
    "date_of_birth",
    "email",
    "phone_number",
    "address_street",
    "address_city",
    "address_state",
    "address_zip",
];

/// A transport whose backend never answers.
#[derive(Debug, Clone, Default)]
pub struct Unreachable;

impl Transport for Unreachable {
    fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        Err(TransportError::Unreachable(format!(
            "connection refused: {}",
            request.url
        )))
    }
}

struct StubUser {
    id: i64,
    email: String,
    name: String,
    password_hash: String,
    roles: Vec<String>,
}

impl StubUser {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "name": self.name,
            "roles": self.roles,
            "is_active": true,
        })
    }
}

struct StubState {
    secret: Vec<u8>,
    users: Vec<StubUser>,
    patients: Vec<Patient>,
    next_user_id: i64,
    offline: bool,
    requests: usize,
}

/// Stub of the patient REST API.
pub struct StubBackend {
    state: Mutex<StubState>,
    token_ttl: Duration,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_password(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn error(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(status, &json!({ "error": message }))
}

fn unauthorized(rejection: &TokenRejection) -> HttpResponse {
    HttpResponse::json(401, &json!({ "msg": rejection.message() }))
}

fn text(body: &Value, field: &str) -> Option<String> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl StubBackend {
    /// Backend with the demo admin account and no patients.
    pub fn new() -> Self {
        let admin = StubUser {
            id: 1,
            email: ADMIN_EMAIL.to_string(),
            name: "Admin User".to_string(),
            password_hash: hash_password(ADMIN_EMAIL, ADMIN_PASSWORD),
            roles: vec!["ADMIN".to_string()],
        };

        Self {
            state: Mutex::new(StubState {
                secret: uuid::Uuid::new_v4().as_bytes().to_vec(),
                users: vec![admin],
                patients: Vec::new(),
                next_user_id: 2,
                offline: false,
                requests: 0,
            }),
            token_ttl: Duration::hours(1),
        }
    }

    /// Seed a few patients with fixed ids.
    pub fn with_sample_patients(self) -> Self {
        let samples = [
            ("Alice", "Walker", "alice.walker@example.com", (1972, 3, 9)),
            ("Carlos", "Mendez", "carlos.mendez@example.com", (1988, 7, 21)),
            ("Priya", "Natarajan", "priya.n@example.com", (2001, 12, 2)),
        ];
        if let Ok(mut state) = self.state.lock() {
            for (n, (first, last, email, (y, m, d))) in (1001..).zip(samples) {
                let input = PatientInput {
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                    email: email.to_string(),
                    date_of_birth: NaiveDate::from_ymd_opt(y, m, d),
                    ..Default::default()
                };
                state.patients.push(input.into_patient(n.to_string()));
            }
        }
        self
    }

    /// Lifetime of issued tokens; negative values issue expired tokens.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Sign with a fixed key so tokens stay valid across instances.
    pub fn with_secret(self, secret: &[u8]) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.secret = secret.to_vec();
        }
        self
    }

    /// Simulate the server going away (or coming back).
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.offline = offline;
        }
    }

    /// Invalidate every token issued so far.
    pub fn revoke_tokens(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.secret = uuid::Uuid::new_v4().as_bytes().to_vec();
        }
    }

    /// Number of requests received, including ones refused while offline.
    pub fn requests_seen(&self) -> usize {
        self.state.lock().map(|s| s.requests).unwrap_or_default()
    }

    /// Snapshot of stored patients.
    pub fn patients(&self) -> Vec<Patient> {
        self.state
            .lock()
            .map(|s| s.patients.clone())
            .unwrap_or_default()
    }

    fn route(&self, state: &mut StubState, request: &HttpRequest) -> HttpResponse {
        let path = path_of(&request.url);
        let body = request.body.clone().unwrap_or(Value::Null);
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["api", "v1", "auth", "login"]) => self.login(state, &body),
            (Method::Post, ["api", "v1", "auth", "register"]) => register(state, &body),
            (Method::Get, ["api", "v1", "users", "me"]) => match authenticate(state, request) {
                Ok(user) => HttpResponse::json(200, &user.to_json()),
                Err(rejection) => unauthorized(&rejection),
            },
            (method, ["api", "v1", "patients", rest @ ..]) if rest.len() <= 1 => {
                let roles = match authenticate(state, request) {
                    Ok(user) => user.roles.clone(),
                    Err(rejection) => return unauthorized(&rejection),
                };
                if !roles.iter().any(|r| PATIENT_ROLES.contains(&r.as_str())) {
                    return HttpResponse::json(
                        403,
                        &json!({ "msg": "User does not have required roles" }),
                    );
                }
                match (method, rest.first()) {
                    (Method::Get, None) => list_patients(state),
                    (Method::Post, None) => create_patient(state, &body),
                    (Method::Get, Some(id)) => get_patient(state, id),
                    (Method::Put, Some(id)) => update_patient(state, id, &body),
                    (Method::Delete, Some(id)) => delete_patient(state, id),
                    _ => error(405, "Method not allowed"),
                }
            }
            _ => error(404, "Not found"),
        }
    }

    fn login(&self, state: &StubState, body: &Value) -> HttpResponse {
        let (Some(email), Some(password)) = (text(body, "email"), text(body, "password")) else {
            return error(400, "Email and password are required");
        };

        let hash = hash_password(&email, &password);
        match state
            .users
            .iter()
            .find(|u| u.email == email && u.password_hash == hash)
        {
            Some(user) => match tokens::issue(
                &state.secret,
                &user.id.to_string(),
                &user.roles,
                Utc::now(),
                self.token_ttl,
            ) {
                Some(token) => HttpResponse::json(200, &json!({ "access_token": token })),
                None => error(500, "Could not sign token"),
            },
            None => error(401, "Invalid email or password"),
        }
    }
}

impl Transport for StubBackend {
    fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TransportError::Unreachable("stub backend poisoned".into()))?;
        state.requests += 1;

        if state.offline {
            return Err(TransportError::Unreachable(format!(
                "connection refused: {}",
                request.url
            )));
        }

        let response = self.route(&mut state, &request);
        debug!(
            method = request.method.as_str(),
            url = %request.url,
            status = response.status,
            "stub handled request"
        );
        Ok(response)
    }
}

/// Path component of a URL, without origin or query.
fn path_of(url: &str) -> &str {
    let rest = match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or("/"),
        None => url,
    };
    rest.split(['?', '#']).next().unwrap_or(rest)
}

fn authenticate<'a>(state: &'a StubState, request: &HttpRequest) -> Result<&'a StubUser, TokenRejection> {
    let token = request
        .header("Authorization")
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(TokenRejection::Missing)?;

    let subject = tokens::verify(&state.secret, token, Utc::now())?;
    state
        .users
        .iter()
        .find(|u| u.id.to_string() == subject)
        .ok_or(TokenRejection::BadSignature)
}

fn register(state: &mut StubState, body: &Value) -> HttpResponse {
    let mut fields = Vec::with_capacity(3);
    for field in ["email", "password", "name"] {
        match text(body, field) {
            Some(value) => fields.push(value),
            None => return error(400, &format!("Missing required field: {field}")),
        }
    }
    let [email, password, name]: [String; 3] = match fields.try_into() {
        Ok(fields) => fields,
        Err(_) => return error(400, "Invalid JSON data provided."),
    };

    if !is_valid_email(&email) {
        return error(400, "Invalid email format");
    }
    if state.users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
        return error(400, "Email already registered");
    }

    let user = StubUser {
        id: state.next_user_id,
        password_hash: hash_password(&email, &password),
        email,
        name,
        roles: vec!["STAFF".to_string()],
    };
    state.next_user_id += 1;

    let response = json!({ "id": user.id, "email": user.email, "name": user.name });
    state.users.push(user);
    HttpResponse::json(201, &response)
}

/// Server-side patient checks; on update only the present fields are checked.
fn validate_patient(state: &StubState, body: &Map<String, Value>, existing: Option<&str>) -> Map<String, Value> {
    let is_update = existing.is_some();
    let present = |field: &str| !is_update || body.contains_key(field);
    let value = |field: &str| body.get(field).and_then(Value::as_str).unwrap_or("").trim();
    let mut errors = Map::new();

    if present("first_name") && value("first_name").is_empty() {
        errors.insert("first_name".into(), "First name is required.".into());
    }
    if present("last_name") && value("last_name").is_empty() {
        errors.insert("last_name".into(), "Last name is required.".into());
    }
    if present("date_of_birth")
        && NaiveDate::parse_from_str(value("date_of_birth"), "%Y-%m-%d").is_err()
    {
        errors.insert(
            "date_of_birth".into(),
            "Valid date of birth (YYYY-MM-DD) is required.".into(),
        );
    }
    if present("email") {
        let email = value("email");
        if !email.contains('@') {
            errors.insert("email".into(), "Valid email is required.".into());
        } else if state
            .patients
            .iter()
            .any(|p| p.email == email && Some(p.id.as_str()) != existing)
        {
            errors.insert("email".into(), "Email address already exists.".into());
        }
    }
    errors
}

fn validation_failed(errors: Map<String, Value>) -> HttpResponse {
    HttpResponse::json(
        400,
        &json!({ "error": "Validation failed", "details": errors }),
    )
}

fn list_patients(state: &StubState) -> HttpResponse {
    HttpResponse::json(200, &json!({ "data": state.patients }))
}

fn get_patient(state: &StubState, id: &str) -> HttpResponse {
    match state.patients.iter().find(|p| p.id == id) {
        Some(patient) => HttpResponse::json(200, &json!({ "data": patient })),
        None => error(404, "Patient not found"),
    }
}

fn create_patient(state: &mut StubState, body: &Value) -> HttpResponse {
    let Some(fields) = body.as_object() else {
        return error(400, "Invalid JSON data provided.");
    };
    let errors = validate_patient(state, fields, None);
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    let mut record = Map::new();
    for field in PATIENT_FIELDS {
        if let Some(value) = fields.get(field) {
            record.insert(field.into(), value.clone());
        }
    }
    record.insert("id".into(), uuid::Uuid::new_v4().to_string().into());

    match serde_json::from_value::<Patient>(Value::Object(record)) {
        Ok(patient) => {
            let response = json!({ "data": patient });
            state.patients.push(patient);
            HttpResponse::json(201, &response)
        }
        Err(e) => error(400, &e.to_string()),
    }
}

fn update_patient(state: &mut StubState, id: &str, body: &Value) -> HttpResponse {
    let Some(index) = state.patients.iter().position(|p| p.id == id) else {
        return error(404, "Patient not found");
    };
    let Some(fields) = body.as_object() else {
        return error(400, "Invalid JSON data provided.");
    };
    let errors = validate_patient(state, fields, Some(id));
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    let mut record = match serde_json::to_value(&state.patients[index]) {
        Ok(Value::Object(record)) => record,
        _ => return error(500, "Could not load patient"),
    };
    for field in PATIENT_FIELDS {
        if let Some(value) = fields.get(field) {
            record.insert(field.into(), value.clone());
        }
    }

    match serde_json::from_value::<Patient>(Value::Object(record)) {
        Ok(patient) => {
            let response = json!({ "data": patient });
            state.patients[index] = patient;
            HttpResponse::json(200, &response)
        }
        Err(e) => error(400, &e.to_string()),
    }
}

fn delete_patient(state: &mut StubState, id: &str) -> HttpResponse {
    let before = state.patients.len();
    state.patients.retain(|p| p.id != id);
    if state.patients.len() == before {
        return error(404, "Patient not found");
    }
    HttpResponse::json(200, &json!({ "message": "Patient deleted successfully" }))
}
