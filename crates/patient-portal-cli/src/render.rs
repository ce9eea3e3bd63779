//! Plain-text rendering of screens and records.

use patient_portal_core::app::Screen;
use patient_portal_core::forms::ValidationErrors;
use patient_portal_core::models::{Patient, PatientRow, PatientSource};

pub fn screen(screen: &Screen) -> String {
    match screen {
        Screen::Loading => "Loading...".to_string(),
        Screen::Login { error } => {
            let mut out = String::from("Not signed in. Run `patient-portal login` first.");
            if let Some(error) = error {
                out.push_str(&format!("\n{error}"));
            }
            out
        }
        Screen::Dashboard { user: Some(user) } => {
            let mut out = format!("Signed in as {} <{}>", user.display_name(), user.email);
            if !user.roles.is_empty() {
                out.push_str(&format!("\nRoles: {}", user.roles.join(", ")));
            }
            out
        }
        Screen::Dashboard { user: None } => "Signed in.".to_string(),
        Screen::Patients { rows, source, error } => {
            let mut out = String::new();
            if *source == Some(PatientSource::Fallback) {
                out.push_str("Backend unreachable; showing sample records.\n");
            }
            if let Some(error) = error {
                out.push_str(&format!("Error: {error}\n"));
            }
            if rows.is_empty() {
                out.push_str("No patients found.");
            } else {
                out.push_str(&patient_table(rows));
            }
            out.trim_end().to_string()
        }
    }
}

/// Rows as an aligned table.
pub fn patient_table(rows: &[PatientRow]) -> String {
    let header = ["ID", "NAME", "AGE", "EMAIL"];
    let cells: Vec<[String; 4]> = rows
        .iter()
        .map(|row| {
            [
                row.id.clone(),
                row.name.clone(),
                row.age.map_or_else(|| "Unknown".to_string(), |a| a.to_string()),
                row.email.clone(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for line in &cells {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |line: [&str; 4]| {
        line.iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![format_line(header)];
    for line in &cells {
        out.push(format_line([&line[0], &line[1], &line[2], &line[3]].map(String::as_str)));
    }
    out.join("\n")
}

/// One record, field per line.
pub fn patient(patient: &Patient) -> String {
    let dob = patient
        .date_of_birth
        .map(|d| d.format("%Y-%m-%d").to_string());
    let address = [
        &patient.address_street,
        &patient.address_city,
        &patient.address_state,
        &patient.address_zip,
    ]
    .into_iter()
    .flatten()
    .map(String::as_str)
    .collect::<Vec<_>>()
    .join(", ");

    let fields = [
        ("ID", Some(patient.id.clone())),
        ("Name", Some(patient.full_name())),
        ("Email", Some(patient.email.clone())),
        ("Phone", patient.phone_number.clone()),
        ("Date of birth", dob),
        ("Address", (!address.is_empty()).then_some(address)),
    ];

    fields
        .into_iter()
        .map(|(label, value)| format!("{label:<14}{}", value.as_deref().unwrap_or("-")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Field messages, one per line.
pub fn validation(errors: &ValidationErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("  {field}: {message}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use patient_portal_core::api::fallback_patients;
    use patient_portal_core::forms::LoginForm;

    fn rows() -> Vec<PatientRow> {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        fallback_patients().iter().map(|p| p.to_row(today)).collect()
    }

    #[test]
    fn test_table_alignment() {
        let table = patient_table(&rows());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ID  NAME"));
        assert!(lines[1].starts_with("1   John Doe"));
        assert!(lines[1].contains("34"));
    }

    #[test]
    fn test_unknown_age() {
        let mut rows = rows();
        rows[0].age = None;
        assert!(patient_table(&rows).contains("Unknown"));
    }

    #[test]
    fn test_fallback_banner() {
        let text = screen(&Screen::Patients {
            rows: rows(),
            source: Some(PatientSource::Fallback),
            error: None,
        });
        assert!(text.starts_with("Backend unreachable"));
    }

    #[test]
    fn test_empty_patients() {
        let text = screen(&Screen::Patients {
            rows: Vec::new(),
            source: Some(PatientSource::Live),
            error: None,
        });
        assert_eq!(text, "No patients found.");
    }

    #[test]
    fn test_patient_detail() {
        let text = patient(&fallback_patients()[0]);
        assert!(text.contains("Date of birth 1990-05-15"));
        assert!(text.contains("123 Main St, Anytown, CA, 12345"));
    }

    #[test]
    fn test_validation_lines() {
        let errors = LoginForm::new("", "").validate().unwrap_err();
        assert_eq!(
            validation(&errors),
            "  email: Please enter your email!\n  password: Please enter your password!"
        );
    }
}
