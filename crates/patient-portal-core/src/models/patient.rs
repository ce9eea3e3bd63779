//! Patient models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::deserialize_id;

/// A patient record as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Server-assigned ID
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Date of birth (YYYY-MM-DD on the wire)
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address_street: Option<String>,
    #[serde(default)]
    pub address_city: Option<String>,
    #[serde(default)]
    pub address_state: Option<String>,
    #[serde(default)]
    pub address_zip: Option<String>,
}

impl Patient {
    /// Display name used by the patient table.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Age in whole years on the given day, if the date of birth is known.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let dob = self.date_of_birth?;
        let mut years = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    /// Writable fields, used to seed the edit form.
    pub fn to_input(&self) -> PatientInput {
        PatientInput {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            date_of_birth: self.date_of_birth,
            address_street: self.address_street.clone(),
            address_city: self.address_city.clone(),
            address_state: self.address_state.clone(),
            address_zip: self.address_zip.clone(),
        }
    }

    /// Project into a table row.
    pub fn to_row(&self, today: NaiveDate) -> PatientRow {
        PatientRow {
            id: self.id.clone(),
            name: self.full_name(),
            age: self.age_on(today),
            email: self.email.clone(),
        }
    }
}

/// Optional fields an update may clear. `date_of_birth` is excluded: the
/// backend rejects a present but empty date.
const CLEARABLE_FIELDS: [&str; 5] = [
    "phone_number",
    "address_street",
    "address_city",
    "address_state",
    "address_zip",
];

/// Body of create/update requests. Serializing directly omits unset
/// optionals, which is the create body; see [`PatientInput::to_update_body`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_zip: Option<String>,
}

impl PatientInput {
    /// Materialize a record with the given server ID.
    pub fn into_patient(self, id: String) -> Patient {
        Patient {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone_number: self.phone_number,
            date_of_birth: self.date_of_birth,
            address_street: self.address_street,
            address_city: self.address_city,
            address_state: self.address_state,
            address_zip: self.address_zip,
        }
    }

    /// Body of an update request. Unset optional fields are sent as `null`
    /// so the backend clears them instead of keeping the stored value.
    pub fn to_update_body(&self) -> serde_json::Result<Value> {
        let mut body = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut body {
            for field in CLEARABLE_FIELDS {
                fields.entry(field).or_insert(Value::Null);
            }
        }
        Ok(body)
    }
}

/// One row of the patient table.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRow {
    pub id: String,
    pub name: String,
    /// Age in years; `None` renders as "Unknown"
    pub age: Option<u32>,
    pub email: String,
}

/// Where a patient list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientSource {
    /// Parsed from a successful backend response
    Live,
    /// Canned records substituted after a failed read
    Fallback,
}

/// A fetched patient list, tagged with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientList {
    pub patients: Vec<Patient>,
    pub source: PatientSource,
}

impl PatientList {
    pub fn live(patients: Vec<Patient>) -> Self {
        Self {
            patients,
            source: PatientSource::Live,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == PatientSource::Fallback
    }
}
