//! Client-side form rules.
//!
//! Run before any request is issued; a failing form never reaches the
//! network.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;

use crate::models::{Patient, PatientInput};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
}

/// Whether the text looks like `local@domain.tld`.
pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_some_and(|re| re.is_match(email))
}

/// Per-field validation failures; the first failing rule per field wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, &'static str>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Message for a field, if it failed.
    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.fields.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.fields.iter().map(|(field, msg)| (*field, *msg))
    }

    fn add(&mut self, field: &'static str, message: &'static str) {
        self.fields.entry(field).or_insert(message);
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.fields.values().copied().collect();
        write!(f, "{}", messages.join(" "))
    }
}

impl std::error::Error for ValidationErrors {}

fn check_email(errors: &mut ValidationErrors, email: &str, missing: &'static str, invalid: &'static str) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", missing);
    } else if !is_valid_email(email) {
        errors.add("email", invalid);
    }
}

fn check_password(errors: &mut ValidationErrors, password: &str) {
    if password.is_empty() {
        errors.add("password", "Please enter your password!");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", "Password must be at least 6 characters!");
    }
}

/// Sign-in form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_email(
            &mut errors,
            &self.email,
            "Please enter your email!",
            "Please enter a valid email!",
        );
        check_password(&mut errors, &self.password);
        errors.into_result()
    }
}

/// Account creation form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "Please enter your full name!");
        } else if name.chars().count() < MIN_NAME_LEN {
            errors.add("name", "Name must be at least 2 characters!");
        }

        check_email(
            &mut errors,
            &self.email,
            "Please enter your email!",
            "Please enter a valid email!",
        );
        check_password(&mut errors, &self.password);

        if self.confirm_password.is_empty() {
            errors.add("confirm_password", "Please confirm your password!");
        } else if self.confirm_password != self.password {
            errors.add("confirm_password", "Passwords do not match!");
        }

        errors.into_result()
    }
}

/// Patient create/edit form, as raw text fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    /// YYYY-MM-DD
    pub date_of_birth: String,
    pub address_street: String,
    pub address_city: String,
    pub address_state: String,
    pub address_zip: String,
}

fn optional(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

impl PatientForm {
    /// Prefill from an existing record (edit modal).
    pub fn from_patient(patient: &Patient) -> Self {
        Self {
            first_name: patient.first_name.clone(),
            last_name: patient.last_name.clone(),
            email: patient.email.clone(),
            phone_number: patient.phone_number.clone().unwrap_or_default(),
            date_of_birth: patient
                .date_of_birth
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            address_street: patient.address_street.clone().unwrap_or_default(),
            address_city: patient.address_city.clone().unwrap_or_default(),
            address_state: patient.address_state.clone().unwrap_or_default(),
            address_zip: patient.address_zip.clone().unwrap_or_default(),
        }
    }

    /// Validate against today's date.
    pub fn validate(&self) -> Result<PatientInput, ValidationErrors> {
        self.validate_on(Utc::now().date_naive())
    }

    /// Validate and convert into a request body.
    pub fn validate_on(&self, today: NaiveDate) -> Result<PatientInput, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.first_name.trim().is_empty() {
            errors.add("first_name", "Please input the first name!");
        }
        if self.last_name.trim().is_empty() {
            errors.add("last_name", "Please input the last name!");
        }
        check_email(
            &mut errors,
            &self.email,
            "Please input the email!",
            "Please input a valid email!",
        );

        let date_of_birth = match self.date_of_birth.trim() {
            "" => {
                errors.add("date_of_birth", "Please select the date of birth!");
                None
            }
            text => match NaiveDate::parse_from_str(text, DATE_FORMAT) {
                Ok(date) if date > today => {
                    errors.add("date_of_birth", "Date of birth cannot be in the future!");
                    None
                }
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add("date_of_birth", "Date of birth must be YYYY-MM-DD!");
                    None
                }
            },
        };

        errors.into_result()?;

        Ok(PatientInput {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone_number: optional(&self.phone_number),
            date_of_birth,
            address_street: optional(&self.address_street),
            address_city: optional(&self.address_city),
            address_state: optional(&self.address_state),
            address_zip: optional(&self.address_zip),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn valid_patient_form() -> PatientForm {
        PatientForm {
            first_name: " Jane ".into(),
            last_name: "Smith".into(),
            email: "jane.smith@example.com".into(),
            date_of_birth: "1985-11-20".into(),
            address_city: "Anytown".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_email_shapes() {
        assert!(email_pattern().is_some());
        assert!(is_valid_email("admin@test.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("admin@test"));
        assert!(!is_valid_email("admin.test.com"));
        assert!(!is_valid_email("admin@test.c"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_login_form() {
        assert!(LoginForm::new("admin@test.com", "admin123").validate().is_ok());

        let errors = LoginForm::new("", "").validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Please enter your email!"));
        assert_eq!(errors.get("password"), Some("Please enter your password!"));

        let errors = LoginForm::new("nope", "12345").validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Please enter a valid email!"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters!")
        );
    }

    #[test]
    fn test_register_form() {
        let mut form = RegisterForm {
            name: "Al".into(),
            email: "al@test.com".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
        };
        assert!(form.validate().is_ok());

        form.name = "A".into();
        form.confirm_password = "secret2".into();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("name"), Some("Name must be at least 2 characters!"));
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match!"));
    }

    #[test]
    fn test_patient_form_converts() {
        let input = valid_patient_form().validate_on(today()).unwrap();
        assert_eq!(input.first_name, "Jane");
        assert_eq!(input.date_of_birth, NaiveDate::from_ymd_opt(1985, 11, 20));
        assert_eq!(input.address_city, Some("Anytown".into()));
        assert_eq!(input.phone_number, None);
    }

    #[test]
    fn test_patient_form_required_fields() {
        let errors = PatientForm::default().validate_on(today()).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors.get("first_name"), Some("Please input the first name!"));
        assert_eq!(
            errors.get("date_of_birth"),
            Some("Please select the date of birth!")
        );
    }

    #[test]
    fn test_patient_form_bad_dates() {
        let mut form = valid_patient_form();

        form.date_of_birth = "20/11/1985".into();
        let errors = form.validate_on(today()).unwrap_err();
        assert_eq!(errors.get("date_of_birth"), Some("Date of birth must be YYYY-MM-DD!"));

        form.date_of_birth = "2024-06-02".into();
        let errors = form.validate_on(today()).unwrap_err();
        assert_eq!(
            errors.get("date_of_birth"),
            Some("Date of birth cannot be in the future!")
        );
    }

    #[test]
    fn test_prefill_round_trips_through_validation() {
        let patient = crate::api::fallback_patients().remove(0);
        let form = PatientForm::from_patient(&patient);
        assert_eq!(form.date_of_birth, "1990-05-15");

        let input = form.validate_on(today()).unwrap();
        assert_eq!(input, patient.to_input());
    }

    #[test]
    fn test_display_joins_messages() {
        let errors = LoginForm::new("", "abcdef").validate().unwrap_err();
        assert_eq!(errors.to_string(), "Please enter your email!");
    }
}
