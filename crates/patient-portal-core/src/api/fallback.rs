//! Canned patient records substituted when the backend cannot be reached.

use chrono::NaiveDate;

use crate::models::{Patient, PatientList, PatientSource};

struct FallbackRecord {
    id: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    phone_number: &'static str,
    date_of_birth: (i32, u32, u32),
}

const RECORDS: [FallbackRecord; 3] = [
    FallbackRecord {
        id: "1",
        first_name: "John",
        last_name: "Doe",
        email: "john.doe@example.com",
        phone_number: "123-456-7890",
        date_of_birth: (1990, 5, 15),
    },
    FallbackRecord {
        id: "2",
        first_name: "Jane",
        last_name: "Smith",
        email: "jane.smith@example.com",
        phone_number: "123-456-7891",
        date_of_birth: (1985, 11, 20),
    },
    FallbackRecord {
        id: "3",
        first_name: "Bob",
        last_name: "Johnson",
        email: "bob.johnson@example.com",
        phone_number: "123-456-7892",
        date_of_birth: (1978, 2, 3),
    },
];

/// The fixed fallback records.
pub fn fallback_patients() -> Vec<Patient> {
    RECORDS
        .iter()
        .map(|r| {
            let (y, m, d) = r.date_of_birth;
            Patient {
                id: r.id.to_string(),
                first_name: r.first_name.to_string(),
                last_name: r.last_name.to_string(),
                email: r.email.to_string(),
                phone_number: Some(r.phone_number.to_string()),
                date_of_birth: NaiveDate::from_ymd_opt(y, m, d),
                address_street: Some("123 Main St".to_string()),
                address_city: Some("Anytown".to_string()),
                address_state: Some("CA".to_string()),
                address_zip: Some("12345".to_string()),
            }
        })
        .collect()
}

/// Fallback records tagged as such.
pub fn fallback_list() -> PatientList {
    PatientList {
        patients: fallback_patients(),
        source: PatientSource::Fallback,
    }
}
